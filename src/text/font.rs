use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{Font as _, FontArc, FontVec, PxScale};
use anyhow::{Context, Result, anyhow};
use fontdb::{Database, Family, Query, Source, Weight};
use tracing::{debug, warn};

use crate::config::Configuration;

/// A font ready to rasterize at a fixed size.
#[derive(Clone)]
pub enum Font {
    Outline { face: FontArc, scale: PxScale },
    /// Built-in bitmap font; honors the size only in whole multiples of its cell.
    Builtin { pixel_size: u32 },
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outline { scale, .. } => f
                .debug_struct("Outline")
                .field("scale", &(scale.x, scale.y))
                .finish(),
            Self::Builtin { pixel_size } => f
                .debug_struct("Builtin")
                .field("pixel_size", pixel_size)
                .finish(),
        }
    }
}

impl Font {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }

    /// `size` is the em size in pixels.
    fn outline(face: FontArc, size: u32) -> Self {
        let size = size.max(1) as f32;
        let scale = match face.units_per_em() {
            Some(units) if units > 0.0 => PxScale::from(size * face.height_unscaled() / units),
            _ => PxScale::from(size),
        };
        Self::Outline { face, scale }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontAlias {
    /// File name under the bundled fonts directory.
    Bundled(String),
    /// Installed family name, optionally with a " Bold" suffix.
    System(String),
}

impl FontAlias {
    /// Entries ending in `.ttf`/`.otf` are bundled files, anything else is a family.
    pub fn from_entry(entry: &str) -> Self {
        let lower = entry.to_ascii_lowercase();
        if lower.ends_with(".ttf") || lower.ends_with(".otf") {
            Self::Bundled(entry.to_string())
        } else {
            Self::System(entry.to_string())
        }
    }
}

fn builtin_aliases() -> BTreeMap<String, FontAlias> {
    [
        ("anton", "Anton-Regular.ttf"),
        ("sixcaps", "SixCaps.ttf"),
        ("impact", "Impact"),
        ("arial_bold", "Arial Bold"),
        ("helvetica_bold", "Helvetica Bold"),
        ("boldonse", "Boldonse.ttf"),
    ]
    .into_iter()
    .map(|(name, entry)| (name.to_string(), FontAlias::from_entry(entry)))
    .collect()
}

/// Maps logical font names to loadable fonts. Immutable once built.
pub struct FontResolver {
    fonts_dir: PathBuf,
    aliases: BTreeMap<String, FontAlias>,
    fallback_family: String,
    db: Database,
}

impl fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontResolver")
            .field("fonts_dir", &self.fonts_dir)
            .field("aliases", &self.aliases)
            .field("fallback_family", &self.fallback_family)
            .field("faces", &self.db.len())
            .finish()
    }
}

impl FontResolver {
    pub fn new(fonts_dir: impl Into<PathBuf>, fallback_family: impl Into<String>, db: Database) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            aliases: builtin_aliases(),
            fallback_family: fallback_family.into(),
            db,
        }
    }

    /// Resolver with no installed faces; resolves bundled files or the built-in font.
    pub fn without_system_fonts(fonts_dir: impl Into<PathBuf>) -> Self {
        Self::new(fonts_dir, "Arial", Database::new())
    }

    pub fn from_config(cfg: &Configuration) -> Self {
        let mut db = Database::new();
        if cfg.system_fonts {
            db.load_system_fonts();
        }
        let fonts_dir = cfg.fonts_path();
        if fonts_dir.is_dir() {
            db.load_fonts_dir(&fonts_dir);
        }
        debug!(faces = db.len(), "font database loaded");
        let mut resolver = Self::new(fonts_dir, cfg.fallback_font.clone(), db);
        for (name, entry) in &cfg.font_aliases {
            resolver = resolver.with_alias(name, FontAlias::from_entry(entry));
        }
        resolver
    }

    pub fn with_alias(mut self, name: &str, alias: FontAlias) -> Self {
        self.aliases.insert(name.to_ascii_lowercase(), alias);
        self
    }

    pub fn alias(&self, name: &str) -> Option<&FontAlias> {
        self.aliases.get(&name.to_ascii_lowercase())
    }

    /// Never fails: alias, literal name, fallback family, then the built-in font.
    pub fn resolve(&self, font_id: &str, size: u32) -> Font {
        if let Some(alias) = self.alias(font_id) {
            let loaded = match alias {
                FontAlias::Bundled(file) => self.load_file(&self.fonts_dir.join(file)),
                FontAlias::System(family) => self.load_system(family),
            };
            match loaded {
                Ok(face) => return Font::outline(face, size),
                Err(err) => debug!(font = font_id, "alias did not load: {err:#}"),
            }
        }

        match self.load_literal(font_id) {
            Ok(face) => return Font::outline(face, size),
            Err(err) => warn!(font = font_id, "failed to load font: {err:#}"),
        }

        match self.load_system(&self.fallback_family) {
            Ok(face) => return Font::outline(face, size),
            Err(err) => debug!(
                family = %self.fallback_family,
                "fallback family unavailable: {err:#}"
            ),
        }

        warn!(font = font_id, "using built-in bitmap font");
        Font::Builtin { pixel_size: size }
    }

    fn load_literal(&self, name: &str) -> Result<FontArc> {
        let path = Path::new(name);
        if path.is_file() {
            return self.load_file(path);
        }
        let bundled = self.fonts_dir.join(name);
        if bundled.is_file() {
            return self.load_file(&bundled);
        }
        self.load_system(name)
    }

    fn load_file(&self, path: &Path) -> Result<FontArc> {
        let data = fs::read(path).with_context(|| format!("failed to read font at {}", path.display()))?;
        FontVec::try_from_vec(data)
            .map(FontArc::new)
            .with_context(|| format!("failed to decode font at {}", path.display()))
    }

    fn load_system(&self, name: &str) -> Result<FontArc> {
        let (family, weight) = split_weight(name);
        let id = self
            .db
            .query(&Query {
                families: &[Family::Name(family)],
                weight,
                ..Default::default()
            })
            .or_else(|| self.scan_faces(family, name))
            .ok_or_else(|| anyhow!("no installed face named {name:?}"))?;
        load_face(&self.db, id)
    }

    fn scan_faces(&self, family: &str, full_name: &str) -> Option<fontdb::ID> {
        let compact: String = full_name.chars().filter(|c| !c.is_whitespace()).collect();
        self.db
            .faces()
            .find(|face| {
                face.families
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case(family))
                    || face.post_script_name.eq_ignore_ascii_case(&compact)
            })
            .map(|face| face.id)
    }
}

fn split_weight(name: &str) -> (&str, Weight) {
    let trimmed = name.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.ends_with(" bold") {
        (&trimmed[..trimmed.len() - 5], Weight::BOLD)
    } else {
        (trimmed, Weight::NORMAL)
    }
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<FontArc> {
    let face = db.face(id).context("missing font face in database")?;
    let index = face.index;
    let data = match &face.source {
        Source::Binary(data) => data.as_ref().as_ref().to_vec(),
        Source::File(path) => {
            fs::read(path).with_context(|| format!("failed to read font at {}", path.display()))?
        }
        Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
    };
    let font = FontVec::try_from_vec_and_index(data, index)
        .context("failed to decode font face from database source")?;
    Ok(FontArc::new(font))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_lookup_is_case_insensitive() {
        let resolver = FontResolver::without_system_fonts("/nonexistent");
        assert_eq!(
            resolver.alias("ANTON"),
            Some(&FontAlias::Bundled("Anton-Regular.ttf".to_string()))
        );
        assert_eq!(
            resolver.alias("Impact"),
            Some(&FontAlias::System("Impact".to_string()))
        );
        assert_eq!(resolver.alias("comic"), None);
    }

    #[test]
    fn missing_everything_falls_back_to_builtin() {
        let resolver = FontResolver::without_system_fonts("/nonexistent");
        let font = resolver.resolve("anton", 64);
        assert!(font.is_builtin());
        let font = resolver.resolve("definitely-not-a-font", 64);
        assert!(matches!(font, Font::Builtin { pixel_size: 64 }));
    }

    #[test]
    fn corrupt_bundled_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Anton-Regular.ttf"), b"not a font").unwrap();
        let resolver = FontResolver::without_system_fonts(dir.path());
        assert!(resolver.resolve("anton", 32).is_builtin());
    }

    #[test]
    fn configured_alias_overrides_builtin_table() {
        let resolver = FontResolver::without_system_fonts("/nonexistent")
            .with_alias("Anton", FontAlias::from_entry("Custom.otf"));
        assert_eq!(
            resolver.alias("anton"),
            Some(&FontAlias::Bundled("Custom.otf".to_string()))
        );
    }

    #[test]
    fn bold_suffix_selects_weight() {
        assert_eq!(split_weight("Arial Bold"), ("Arial", Weight::BOLD));
        assert_eq!(split_weight("Impact"), ("Impact", Weight::NORMAL));
    }
}
