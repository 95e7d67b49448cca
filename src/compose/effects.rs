use std::fmt;

use image::Rgba;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::processing::blur::MAX_SIGMA;
use crate::processing::color::{parse_color, parse_color_or, with_opacity};

pub const MAX_OUTLINE_WIDTH: u32 = 20;
pub const MAX_GLOW_RADIUS: u32 = 200;
pub const MAX_DEPTH_LAYERS: u32 = 100;
pub const MAX_PADDING: u32 = 500;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Shadow,
    Outline,
    Glow,
    Depth3D,
    TextGradient,
    BackgroundGradient,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::Outline => "outline",
            Self::Glow => "glow",
            Self::Depth3D => "3d_depth",
            Self::TextGradient => "text_gradient",
            Self::BackgroundGradient => "background_gradient",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "shadow" => Some(Self::Shadow),
            "outline" => Some(Self::Outline),
            "glow" => Some(Self::Glow),
            "3d_depth" => Some(Self::Depth3D),
            "text_gradient" => Some(Self::TextGradient),
            "background_gradient" => Some(Self::BackgroundGradient),
            _ => None,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowEffect {
    pub offset: (i32, i32),
    /// Shadow color with its alpha already scaled by the opacity.
    pub color: Rgba<u8>,
    pub blur_radius: f32,
}

impl ShadowEffect {
    pub fn new(offset: (i32, i32), color: Rgba<u8>, opacity: f32, blur_radius: f32) -> Self {
        Self {
            offset,
            color: with_opacity(color, clamp_unit(opacity, 0.5)),
            blur_radius: clamp_finite(blur_radius, 3.0, 0.0, MAX_SIGMA),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEffect {
    pub width: u32,
    pub color: Rgba<u8>,
}

impl OutlineEffect {
    pub fn new(width: i64, color: Rgba<u8>, opacity: f32) -> Self {
        Self {
            width: width.clamp(0, MAX_OUTLINE_WIDTH as i64) as u32,
            color: with_opacity(color, clamp_unit(opacity, 1.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlowEffect {
    pub radius: u32,
    pub color: Rgba<u8>,
    pub opacity: f32,
}

impl GlowEffect {
    pub fn new(radius: i64, color: Rgba<u8>, opacity: f32) -> Self {
        Self {
            radius: radius.clamp(0, MAX_GLOW_RADIUS as i64) as u32,
            color,
            opacity: clamp_unit(opacity, 0.7),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthEffect {
    pub layers: u32,
    pub angle_deg: f32,
    pub distance: f32,
    pub colors: Vec<Rgba<u8>>,
}

impl DepthEffect {
    pub fn new(layers: i64, angle_deg: f32, distance: f32, colors: Vec<Rgba<u8>>) -> Self {
        Self {
            layers: layers.clamp(1, MAX_DEPTH_LAYERS as i64) as u32,
            angle_deg: clamp_finite(angle_deg, 45.0, -360.0, 360.0),
            distance: clamp_finite(distance, 2.0, -100.0, 100.0),
            colors: if colors.is_empty() {
                default_depth_colors()
            } else {
                colors
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextGradientDirection {
    #[default]
    Horizontal,
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextGradientEffect {
    pub colors: Vec<Rgba<u8>>,
    pub direction: TextGradientDirection,
    /// When false the gradient spans the text's own bounding box instead of
    /// the whole canvas; glyph coverage still clips it.
    pub use_text_as_mask: bool,
}

impl TextGradientEffect {
    pub fn new(colors: Vec<Rgba<u8>>, direction: TextGradientDirection, use_text_as_mask: bool) -> Self {
        let colors = if colors.len() < 2 {
            warn!(count = colors.len(), "text gradient needs two colors; using preset");
            default_text_gradient_colors()
        } else {
            colors
        };
        Self {
            colors,
            direction,
            use_text_as_mask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundGradientDirection {
    Horizontal,
    #[default]
    Vertical,
    Radial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundGradientEffect {
    pub colors: Vec<Rgba<u8>>,
    pub direction: BackgroundGradientDirection,
    pub padding: u32,
    pub corner_radius: u32,
    pub opacity: f32,
}

impl BackgroundGradientEffect {
    pub fn new(
        colors: Vec<Rgba<u8>>,
        direction: BackgroundGradientDirection,
        padding: i64,
        corner_radius: i64,
        opacity: f32,
    ) -> Self {
        Self {
            colors: if colors.is_empty() {
                default_background_colors()
            } else {
                colors
            },
            direction,
            padding: padding.clamp(0, MAX_PADDING as i64) as u32,
            corner_radius: corner_radius.clamp(0, MAX_PADDING as i64) as u32,
            opacity: clamp_unit(opacity, 0.7),
        }
    }
}

/// One decoration applied to a text layer. Values are clamped on construction.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectSpec {
    Shadow(ShadowEffect),
    Outline(OutlineEffect),
    Glow(GlowEffect),
    Depth3D(DepthEffect),
    TextGradient(TextGradientEffect),
    BackgroundGradient(BackgroundGradientEffect),
}

impl EffectSpec {
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Shadow(_) => EffectKind::Shadow,
            Self::Outline(_) => EffectKind::Outline,
            Self::Glow(_) => EffectKind::Glow,
            Self::Depth3D(_) => EffectKind::Depth3D,
            Self::TextGradient(_) => EffectKind::TextGradient,
            Self::BackgroundGradient(_) => EffectKind::BackgroundGradient,
        }
    }

    /// The preset used when a request names an effect without settings.
    pub fn preset(kind: EffectKind) -> Self {
        EffectSettings::default().build(kind)
    }
}

fn clamp_unit(value: f32, fallback: f32) -> f32 {
    clamp_finite(value, fallback, 0.0, 1.0)
}

fn clamp_finite(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn default_depth_colors() -> Vec<Rgba<u8>> {
    vec![
        Rgba([0x33, 0x33, 0x33, 255]),
        Rgba([0x66, 0x66, 0x66, 255]),
        Rgba([0x99, 0x99, 0x99, 255]),
    ]
}

fn default_text_gradient_colors() -> Vec<Rgba<u8>> {
    vec![
        Rgba([255, 0, 0, 255]),
        Rgba([255, 255, 0, 255]),
        Rgba([0, 255, 0, 255]),
        Rgba([0, 255, 255, 255]),
        Rgba([0, 0, 255, 255]),
        Rgba([255, 0, 255, 255]),
    ]
}

fn default_background_colors() -> Vec<Rgba<u8>> {
    vec![Rgba([255, 0, 0, 0x88]), Rgba([0, 0, 255, 0x88])]
}

/// Wire shape of the `effects` field: typed `{type, settings}` or the legacy
/// direct-key object. An object carrying a `type` key is always the typed form.
#[derive(Debug, Clone)]
pub enum EffectsPayload {
    Typed(TypedEffect),
    Legacy(LegacyEffects),
}

#[derive(Debug, Clone)]
pub struct TypedEffect {
    pub kind: String,
    pub settings: EffectSettings,
}

/// Flat union of every effect's settings; missing or invalid keys take the
/// preset value.
#[derive(Debug, Clone, Default)]
pub struct EffectSettings {
    pub offset: Option<Vec<f64>>,
    pub color: Option<String>,
    pub opacity: Option<f32>,
    pub blur: Option<f32>,
    pub width: Option<i64>,
    pub radius: Option<i64>,
    pub layers: Option<i64>,
    pub angle: Option<f32>,
    pub distance: Option<f32>,
    pub color_gradient: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub direction: Option<String>,
    pub use_mask: Option<bool>,
    pub padding: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEffects {
    pub shadow: Option<LegacyShadow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyShadow {
    pub offset: Option<Vec<f64>>,
    pub color: Option<String>,
}

impl<'de> Deserialize<'de> for EffectsPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Value::Mapping(map) = &value else {
            return Err(D::Error::custom("effects must be an object"));
        };
        let Some(kind) = map.get("type") else {
            return serde_yaml::from_value(value)
                .map(Self::Legacy)
                .map_err(D::Error::custom);
        };
        let kind = kind
            .as_str()
            .ok_or_else(|| D::Error::custom("effect type must be a string"))?
            .to_string();
        let settings = match map.get("settings") {
            None | Some(Value::Null) => EffectSettings::default(),
            Some(Value::Mapping(settings)) => EffectSettings::from_mapping(settings),
            Some(_) => {
                warn!(effect = %kind, "effect settings are not an object; using presets");
                EffectSettings::default()
            }
        };
        Ok(Self::Typed(TypedEffect { kind, settings }))
    }
}

/// One setting, or `None` with a warning when it has the wrong shape.
fn setting<T: DeserializeOwned>(settings: &Mapping, key: &str) -> Option<T> {
    let raw = settings.get(key)?;
    if raw.is_null() {
        return None;
    }
    match serde_yaml::from_value(raw.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(setting = key, "invalid effect setting; using preset: {err}");
            None
        }
    }
}

impl EffectsPayload {
    /// Validates once at parse time. Unknown effect types yield `None`, which
    /// renders plain text.
    pub fn into_spec(self) -> Option<EffectSpec> {
        match self {
            Self::Typed(typed) => match EffectKind::from_name(&typed.kind) {
                Some(kind) => Some(typed.settings.build(kind)),
                None => {
                    warn!(effect = %typed.kind, "unknown effect type; drawing plain text");
                    None
                }
            },
            Self::Legacy(LegacyEffects { shadow: None }) => {
                warn!("effects object names no known effect; drawing plain text");
                None
            }
            Self::Legacy(LegacyEffects {
                shadow: Some(shadow),
            }) => {
                let color = shadow
                    .color
                    .as_deref()
                    .map_or(BLACK, |raw| parse_color_or(raw, BLACK));
                // The legacy shape carries opacity in the color's own alpha.
                Some(EffectSpec::Shadow(ShadowEffect {
                    offset: parse_offset(shadow.offset.as_deref()),
                    color,
                    blur_radius: 0.0,
                }))
            }
        }
    }
}

impl EffectSettings {
    pub fn from_mapping(settings: &Mapping) -> Self {
        Self {
            offset: setting(settings, "offset"),
            color: setting(settings, "color"),
            opacity: setting(settings, "opacity"),
            blur: setting(settings, "blur"),
            width: setting(settings, "width"),
            radius: setting(settings, "radius"),
            layers: setting(settings, "layers"),
            angle: setting(settings, "angle"),
            distance: setting(settings, "distance"),
            color_gradient: setting(settings, "color_gradient"),
            colors: setting(settings, "colors"),
            direction: setting(settings, "direction"),
            use_mask: setting(settings, "use_mask"),
            padding: setting(settings, "padding"),
        }
    }

    fn color_or(&self, fallback: Rgba<u8>) -> Rgba<u8> {
        self.color
            .as_deref()
            .map_or(fallback, |raw| parse_color_or(raw, fallback))
    }

    pub fn build(&self, kind: EffectKind) -> EffectSpec {
        match kind {
            EffectKind::Shadow => EffectSpec::Shadow(ShadowEffect::new(
                parse_offset(self.offset.as_deref()),
                self.color_or(BLACK),
                self.opacity.unwrap_or(0.5),
                self.blur.unwrap_or(3.0),
            )),
            EffectKind::Outline => EffectSpec::Outline(OutlineEffect::new(
                self.width.unwrap_or(2),
                self.color_or(BLACK),
                self.opacity.unwrap_or(1.0),
            )),
            EffectKind::Glow => EffectSpec::Glow(GlowEffect::new(
                self.radius.unwrap_or(10),
                self.color_or(WHITE),
                self.opacity.unwrap_or(0.7),
            )),
            EffectKind::Depth3D => EffectSpec::Depth3D(DepthEffect::new(
                self.layers.unwrap_or(10),
                self.angle.unwrap_or(45.0),
                self.distance.unwrap_or(2.0),
                parse_color_list(self.color_gradient.as_deref()),
            )),
            EffectKind::TextGradient => {
                let direction = match self.direction.as_deref().map(str::to_ascii_lowercase) {
                    None => TextGradientDirection::default(),
                    Some(dir) if dir == "horizontal" => TextGradientDirection::Horizontal,
                    Some(dir) if dir == "vertical" => TextGradientDirection::Vertical,
                    Some(dir) if dir == "diagonal" => TextGradientDirection::Diagonal,
                    Some(other) => {
                        warn!(direction = %other, "unknown text gradient direction");
                        TextGradientDirection::default()
                    }
                };
                let colors = match self.colors.as_deref() {
                    None => default_text_gradient_colors(),
                    Some(raw) => parse_color_list(Some(raw)),
                };
                EffectSpec::TextGradient(TextGradientEffect::new(
                    colors,
                    direction,
                    self.use_mask.unwrap_or(true),
                ))
            }
            EffectKind::BackgroundGradient => {
                let direction = match self.direction.as_deref().map(str::to_ascii_lowercase) {
                    None => BackgroundGradientDirection::default(),
                    Some(dir) if dir == "horizontal" => BackgroundGradientDirection::Horizontal,
                    Some(dir) if dir == "vertical" => BackgroundGradientDirection::Vertical,
                    Some(dir) if dir == "radial" => BackgroundGradientDirection::Radial,
                    Some(other) => {
                        warn!(direction = %other, "unknown background gradient direction");
                        BackgroundGradientDirection::default()
                    }
                };
                EffectSpec::BackgroundGradient(BackgroundGradientEffect::new(
                    parse_color_list(self.colors.as_deref()),
                    direction,
                    self.padding.unwrap_or(10),
                    self.radius.unwrap_or(0),
                    self.opacity.unwrap_or(0.7),
                ))
            }
        }
    }
}

fn parse_offset(raw: Option<&[f64]>) -> (i32, i32) {
    match raw {
        Some([x, y, ..]) if x.is_finite() && y.is_finite() => (*x as i32, *y as i32),
        Some(_) => {
            warn!("malformed shadow offset; using (5, 5)");
            (5, 5)
        }
        None => (5, 5),
    }
}

// Unparseable entries are dropped; callers substitute presets for short lists.
fn parse_color_list(raw: Option<&[String]>) -> Vec<Rgba<u8>> {
    raw.unwrap_or_default()
        .iter()
        .filter_map(|entry| {
            let parsed = parse_color(entry);
            if parsed.is_none() {
                warn!(color = %entry, "dropping unrecognized gradient color");
            }
            parsed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(json: &str) -> Option<EffectSpec> {
        serde_json::from_str::<EffectsPayload>(json)
            .unwrap()
            .into_spec()
    }

    #[test]
    fn typed_shadow_uses_presets() {
        let spec = typed(r#"{"type": "shadow"}"#).unwrap();
        assert_eq!(
            spec,
            EffectSpec::Shadow(ShadowEffect {
                offset: (5, 5),
                color: Rgba([0, 0, 0, 127]),
                blur_radius: 3.0,
            })
        );
    }

    #[test]
    fn settings_are_clamped() {
        let spec = typed(
            r##"{"type": "outline", "settings": {"width": 99, "opacity": 4.0, "color": "#ff0000"}}"##,
        )
        .unwrap();
        assert_eq!(
            spec,
            EffectSpec::Outline(OutlineEffect {
                width: MAX_OUTLINE_WIDTH,
                color: Rgba([255, 0, 0, 255]),
            })
        );
        let EffectSpec::Glow(glow) =
            typed(r#"{"type": "glow", "settings": {"radius": -3, "opacity": -1}}"#).unwrap()
        else {
            panic!("expected glow");
        };
        assert_eq!(glow.radius, 0);
        assert_eq!(glow.opacity, 0.0);
    }

    #[test]
    fn depth_parses_gradient_list() {
        let EffectSpec::Depth3D(depth) = typed(
            r##"{"type": "3d_depth", "settings": {"layers": 0, "color_gradient": ["#111111", "bogus"]}}"##,
        )
        .unwrap() else {
            panic!("expected depth");
        };
        assert_eq!(depth.layers, 1);
        assert_eq!(depth.colors, vec![Rgba([0x11, 0x11, 0x11, 255])]);
    }

    #[test]
    fn short_text_gradient_list_uses_preset() {
        let EffectSpec::TextGradient(gradient) = typed(
            r##"{"type": "text_gradient", "settings": {"colors": ["#000000"], "direction": "diagonal"}}"##,
        )
        .unwrap() else {
            panic!("expected text gradient");
        };
        assert_eq!(gradient.colors.len(), 6);
        assert_eq!(gradient.direction, TextGradientDirection::Diagonal);
        assert!(gradient.use_text_as_mask);
    }

    #[test]
    fn background_gradient_defaults() {
        let EffectSpec::BackgroundGradient(bg) = typed(r#"{"type": "background_gradient"}"#).unwrap()
        else {
            panic!("expected background gradient");
        };
        assert_eq!(bg.direction, BackgroundGradientDirection::Vertical);
        assert_eq!(bg.padding, 10);
        assert_eq!(bg.corner_radius, 0);
        assert_eq!(bg.colors, default_background_colors());
    }

    #[test]
    fn bad_setting_keeps_effect_with_preset_value() {
        let spec = typed(r##"{"type": "outline", "settings": {"width": 2.5, "color": "#ff0000"}}"##);
        assert_eq!(
            spec,
            Some(EffectSpec::Outline(OutlineEffect {
                width: 2,
                color: Rgba([255, 0, 0, 255]),
            }))
        );
    }

    #[test]
    fn null_or_scalar_settings_use_presets() {
        let preset = Some(EffectSpec::preset(EffectKind::Glow));
        assert_eq!(typed(r#"{"type": "glow", "settings": null}"#), preset);
        assert_eq!(typed(r#"{"type": "glow", "settings": "bright"}"#), preset);
    }

    #[test]
    fn type_key_selects_typed_form() {
        let payload: EffectsPayload = serde_json::from_str(r#"{"type": "glow", "shadow": {}}"#).unwrap();
        assert!(matches!(payload, EffectsPayload::Typed(_)));
        assert!(serde_json::from_str::<EffectsPayload>(r#"{"type": 3}"#).is_err());
        assert!(serde_json::from_str::<EffectsPayload>(r#""sparkles""#).is_err());
    }

    #[test]
    fn unknown_type_renders_plain() {
        assert_eq!(typed(r#"{"type": "sparkle", "settings": {}}"#), None);
    }

    #[test]
    fn legacy_shadow_maps_to_unblurred_shadow() {
        let spec = typed(r##"{"shadow": {"offset": [2, 3], "color": "#00000080"}}"##).unwrap();
        assert_eq!(
            spec,
            EffectSpec::Shadow(ShadowEffect {
                offset: (2, 3),
                color: Rgba([0, 0, 0, 128]),
                blur_radius: 0.0,
            })
        );
    }
}
