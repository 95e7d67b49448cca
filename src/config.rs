use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::compose::position::DEFAULT_VERTICAL_ADJUSTMENT;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory holding bundled font files.
    pub fonts_dir: PathBuf,
    /// Whether installed system fonts are indexed at startup.
    pub system_fonts: bool,
    /// Family tried when a requested font cannot be loaded.
    pub fallback_font: String,
    /// Extra logical font names; values ending in `.ttf`/`.otf` are bundled files.
    pub font_aliases: BTreeMap<String, String>,
    /// Fraction of the text height the draw origin is lifted by.
    pub vertical_adjustment: f64,
    /// Requested font sizes above this are clamped.
    pub max_font_size: u32,
    /// Root that relative paths below are resolved against.
    pub base_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// Where rendered results are written.
    pub output_dir: PathBuf,
    pub public_dir: PathBuf,
    /// Upper bound on a remote image fetch.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Age after which rendered outputs are swept.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.vertical_adjustment.is_finite() && (0.0..=1.0).contains(&self.vertical_adjustment),
            "vertical-adjustment must be within [0, 1]"
        );
        ensure!(self.max_font_size > 0, "max-font-size must be greater than zero");
        ensure!(
            !self.fallback_font.trim().is_empty(),
            "fallback-font must not be empty"
        );
        ensure!(
            self.fetch_timeout > Duration::ZERO,
            "fetch-timeout must be positive"
        );
        ensure!(self.retention > Duration::ZERO, "retention must be positive");
        Ok(self)
    }

    fn under_base(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn fonts_path(&self) -> PathBuf {
        self.under_base(&self.fonts_dir)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.under_base(&self.uploads_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.under_base(&self.output_dir)
    }

    pub fn public_path(&self) -> PathBuf {
        self.under_base(&self.public_dir)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("assets/fonts"),
            system_fonts: true,
            fallback_font: "Arial".to_string(),
            font_aliases: BTreeMap::new(),
            vertical_adjustment: DEFAULT_VERTICAL_ADJUSTMENT,
            max_font_size: 1000,
            base_dir: PathBuf::from("."),
            uploads_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("uploads/processed"),
            public_dir: PathBuf::from("uploads/public"),
            fetch_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(10 * 60),
        }
    }
}
