//! Request and response shapes, and their normalization into render inputs.
//!
//! Malformed optional values fall back to safe defaults with a warning;
//! only structurally required fields (text, image references) are errors.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::compose::effects::EffectsPayload;
use crate::compose::layers::{TextLayer, TextStyle};
use crate::compose::suggest::Suggestion;
use crate::error::{Error, Result};
use crate::geometry::{ImageSize, Point, TextSize};
use crate::processing::blend::BlendMode;
use crate::processing::color::parse_color_or_white;

pub const DEFAULT_ANCHOR: i32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionPayload {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl PositionPayload {
    /// Coordinates truncate toward zero; missing or non-finite ones use the
    /// fixed default anchor.
    pub fn anchor(&self) -> Point {
        let axis = |value: Option<f64>, name: &str| match value {
            Some(v) if v.is_finite() => v as i32,
            Some(v) => {
                warn!(axis = name, value = v, "non-finite coordinate; using default");
                DEFAULT_ANCHOR
            }
            None => DEFAULT_ANCHOR,
        };
        Point::new(axis(self.x, "x"), axis(self.y, "y"))
    }
}

fn default_font_size() -> i64 {
    120
}

fn default_dramatic_font_size() -> i64 {
    150
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

fn default_font_name() -> String {
    "Impact".to_string()
}

fn default_dramatic_font_name() -> String {
    "anton".to_string()
}

/// Effects that fail to parse are dropped rather than failing the request.
fn lenient_effects<'de, D>(deserializer: D) -> std::result::Result<Option<EffectsPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_yaml::from_value::<EffectsPayload>(value) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!("ignoring malformed effects: {err}");
            None
        }
    }))
}

/// Longest text, in characters, a single layer may carry.
pub const MAX_TEXT_CHARS: usize = 1000;

fn required_text(text: Option<String>) -> Result<String> {
    let text = text.ok_or(Error::InvalidParameter {
        field: "text",
        reason: "text is required".to_string(),
    })?;
    bounded_text(&text)?;
    Ok(text)
}

fn bounded_text(text: &str) -> Result<()> {
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(Error::InvalidParameter {
            field: "text",
            reason: format!("{chars} characters exceeds the limit of {MAX_TEXT_CHARS}"),
        });
    }
    Ok(())
}

fn required_reference(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidParameter {
            field,
            reason: "image reference must not be empty".to_string(),
        });
    }
    Ok(())
}

fn style(
    font_size: i64,
    max_font_size: u32,
    color: &str,
    font_name: &str,
    effects: Option<EffectsPayload>,
) -> TextStyle {
    let size = font_size.clamp(1, max_font_size.max(1) as i64) as u32;
    if size as i64 != font_size {
        warn!(requested = font_size, used = size, "font size out of range");
    }
    TextStyle {
        font_id: font_name.to_string(),
        font_size_pt: size,
        color: parse_color_or_white(color),
        effect: effects.and_then(EffectsPayload::into_spec),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTextRequest {
    pub background_path: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub position: PositionPayload,
    #[serde(default = "default_font_size")]
    pub font_size: i64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default, deserialize_with = "lenient_effects")]
    pub effects: Option<EffectsPayload>,
}

impl AddTextRequest {
    pub fn into_layer(self, max_font_size: u32) -> Result<(String, TextLayer)> {
        required_reference("background_path", &self.background_path)?;
        let text = required_text(self.text)?;
        let layer = TextLayer {
            text,
            anchor: self.position.anchor(),
            style: style(
                self.font_size,
                max_font_size,
                &self.color,
                &self.font_name,
                self.effects,
            ),
        };
        Ok((self.background_path, layer))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DramaticTextRequest {
    pub background_path: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub position: PositionPayload,
    #[serde(default = "default_dramatic_font_size")]
    pub font_size: i64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_dramatic_font_name")]
    pub font_name: String,
    #[serde(default)]
    pub with_period: bool,
    #[serde(default)]
    pub to_uppercase: bool,
    #[serde(default, deserialize_with = "lenient_effects")]
    pub effects: Option<EffectsPayload>,
}

impl DramaticTextRequest {
    pub fn into_layer(self, max_font_size: u32) -> Result<(String, TextLayer)> {
        required_reference("background_path", &self.background_path)?;
        let text = dramatic_text(
            &required_text(self.text)?,
            self.with_period,
            self.to_uppercase,
        );
        let layer = TextLayer {
            text,
            anchor: self.position.anchor(),
            style: style(
                self.font_size,
                max_font_size,
                &self.color,
                &self.font_name,
                self.effects,
            ),
        };
        Ok((self.background_path, layer))
    }
}

/// Uppercases and appends a period when asked. A period is not added after
/// text that already ends in terminal punctuation.
pub fn dramatic_text(text: &str, with_period: bool, to_uppercase: bool) -> String {
    let mut out = if to_uppercase {
        text.to_uppercase()
    } else {
        text.to_string()
    };
    if with_period && !out.is_empty() && !out.trim_end().ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerStylePayload {
    #[serde(default = "default_font_size")]
    pub font_size: i64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_dramatic_font_name")]
    pub font_name: String,
    #[serde(default, deserialize_with = "lenient_effects")]
    pub effects: Option<EffectsPayload>,
}

impl Default for LayerStylePayload {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            color: default_color(),
            font_name: default_dramatic_font_name(),
            effects: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextLayerPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub position: PositionPayload,
    #[serde(default)]
    pub style: LayerStylePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiLayerRequest {
    pub background_path: String,
    #[serde(default)]
    pub text_layers: Vec<TextLayerPayload>,
}

impl MultiLayerRequest {
    pub fn into_layers(self, max_font_size: u32) -> Result<(String, Vec<TextLayer>)> {
        required_reference("background_path", &self.background_path)?;
        let layers = self
            .text_layers
            .into_iter()
            .map(|payload| {
                Ok(TextLayer {
                    text: required_text(payload.text)?,
                    anchor: payload.position.anchor(),
                    style: style(
                        payload.style.font_size,
                        max_font_size,
                        &payload.style.color,
                        &payload.style.font_name,
                        payload.style.effects,
                    ),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((self.background_path, layers))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeRequest {
    pub background_with_text_path: String,
    pub foreground_path: String,
    #[serde(default)]
    pub blend_mode: Option<String>,
    #[serde(default)]
    pub blend_opacity: Option<f32>,
}

impl ComposeRequest {
    pub fn blend(&self) -> (BlendMode, f32) {
        let mode = match self.blend_mode.as_deref() {
            None => BlendMode::Normal,
            Some(name) => BlendMode::from_name(name).unwrap_or_else(|| {
                warn!(mode = name, "unknown blend mode; using normal");
                BlendMode::Normal
            }),
        };
        (mode, self.blend_opacity.unwrap_or(1.0))
    }

    pub fn validate(&self) -> Result<()> {
        required_reference("background_with_text_path", &self.background_with_text_path)?;
        required_reference("foreground_path", &self.foreground_path)
    }
}

fn default_template() -> String {
    "instagram_post".to_string()
}

fn default_padding_percent() -> f32 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRequest {
    pub foreground_path: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_color")]
    pub background_color: String,
    #[serde(default = "default_padding_percent")]
    pub padding_percent: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    pub background_path: String,
    pub text: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: i64,
    #[serde(default = "default_font_name")]
    pub font_name: String,
}

impl SuggestRequest {
    pub fn text(&self) -> Result<&str> {
        let text = self.text.as_deref().ok_or(Error::InvalidParameter {
            field: "text",
            reason: "text is required".to_string(),
        })?;
        bounded_text(text)?;
        Ok(text)
    }
}

/// Outcome of a single-layer text render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionResult {
    #[serde(rename = "image_with_text", serialize_with = "path_string")]
    pub image_path: std::path::PathBuf,
    #[serde(rename = "text_size")]
    pub text_bounding_box: TextSize,
    /// The caller's anchor echoed back, not the adjusted draw origin.
    #[serde(rename = "position")]
    pub resolved_position: Point,
    pub image_size: ImageSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayersResponse {
    #[serde(serialize_with = "path_string")]
    pub image_with_text: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeResponse {
    #[serde(serialize_with = "path_string")]
    pub final_image: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateResponse {
    #[serde(serialize_with = "path_string")]
    pub template_image: std::path::PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestResponse {
    pub text_size: TextSize,
    pub suggestions: Vec<Suggestion>,
}

fn path_string<S: serde::Serializer>(path: &Path, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::effects::{EffectKind, EffectSpec};
    use image::Rgba;

    #[test]
    fn add_text_defaults() {
        let req: AddTextRequest =
            serde_json::from_str(r#"{"background_path": "/uploads/bg.png", "text": "hi"}"#).unwrap();
        let (bg, layer) = req.into_layer(1000).unwrap();
        assert_eq!(bg, "/uploads/bg.png");
        assert_eq!(layer.anchor, Point::new(10, 10));
        assert_eq!(layer.style.font_id, "Impact");
        assert_eq!(layer.style.font_size_pt, 120);
        assert_eq!(layer.style.color, Rgba([255, 255, 255, 255]));
        assert_eq!(layer.style.effect, None);
    }

    #[test]
    fn missing_text_is_rejected() {
        let req: AddTextRequest =
            serde_json::from_str(r#"{"background_path": "bg.png", "position": {"x": 5}}"#).unwrap();
        let err = req.into_layer(1000).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { field: "text", .. }));
    }

    #[test]
    fn bad_values_normalize() {
        let req: AddTextRequest = serde_json::from_str(
            r##"{"background_path": "bg.png", "text": "x", "color": "#nothex",
                "position": {"x": 12.9, "y": -3.2}, "font_size": 99999,
                "effects": "sparkles"}"##,
        )
        .unwrap();
        let (_, layer) = req.into_layer(1000).unwrap();
        assert_eq!(layer.anchor, Point::new(12, -3));
        assert_eq!(layer.style.font_size_pt, 1000);
        assert_eq!(layer.style.color, Rgba([255, 255, 255, 255]));
        assert_eq!(layer.style.effect, None);
    }

    #[test]
    fn typed_effects_parse_from_yaml() {
        let req: AddTextRequest = serde_yaml::from_str(
            "background_path: bg.png\ntext: hi\neffects:\n  type: glow\n  settings:\n    radius: 4\n",
        )
        .unwrap();
        let (_, layer) = req.into_layer(1000).unwrap();
        assert_eq!(layer.style.effect.map(|e| e.kind()), Some(EffectKind::Glow));
    }

    #[test]
    fn overlong_text_is_rejected() {
        let req = AddTextRequest {
            text: Some("W".repeat(MAX_TEXT_CHARS + 1)),
            ..serde_json::from_str::<AddTextRequest>(r#"{"background_path": "bg.png"}"#).unwrap()
        };
        let err = req.into_layer(1000).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { field: "text", .. }));

        let suggest = SuggestRequest {
            text: Some("é".repeat(MAX_TEXT_CHARS)),
            ..serde_json::from_str::<SuggestRequest>(r#"{"background_path": "bg.png"}"#).unwrap()
        };
        assert!(suggest.text().is_ok());
    }

    #[test]
    fn one_bad_effect_setting_keeps_the_effect() {
        let req: AddTextRequest = serde_json::from_str(
            r#"{"background_path": "bg.png", "text": "x",
                "effects": {"type": "outline", "settings": {"width": 2.5}}}"#,
        )
        .unwrap();
        let (_, layer) = req.into_layer(1000).unwrap();
        assert_eq!(
            layer.style.effect,
            Some(EffectSpec::preset(EffectKind::Outline))
        );
    }

    #[test]
    fn dramatic_transforms() {
        assert_eq!(dramatic_text("go team", true, true), "GO TEAM.");
        assert_eq!(dramatic_text("done!", true, false), "done!");
        assert_eq!(dramatic_text("calm", false, false), "calm");
        assert_eq!(dramatic_text("", true, false), "");
    }

    #[test]
    fn dramatic_defaults() {
        let req: DramaticTextRequest =
            serde_json::from_str(r#"{"background_path": "bg.png", "text": "wow"}"#).unwrap();
        let (_, layer) = req.into_layer(1000).unwrap();
        assert_eq!(layer.text, "wow");
        assert_eq!(layer.style.font_id, "anton");
        assert_eq!(layer.style.font_size_pt, 150);
    }

    #[test]
    fn multi_layer_styles_default_per_layer() {
        let req: MultiLayerRequest = serde_json::from_str(
            r#"{"background_path": "bg.png", "text_layers": [
                {"text": "a", "position": {"x": 1, "y": 2}},
                {"text": "b", "style": {"font_size": 40, "effects": {"shadow": {"offset": [1, 1]}}}}
            ]}"#,
        )
        .unwrap();
        let (_, layers) = req.into_layers(1000).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].anchor, Point::new(1, 2));
        assert_eq!(layers[0].style.font_id, "anton");
        assert_eq!(layers[1].style.font_size_pt, 40);
        assert_eq!(
            layers[1].style.effect.as_ref().map(EffectSpec::kind),
            Some(EffectKind::Shadow)
        );
    }

    #[test]
    fn unknown_blend_mode_is_normal() {
        let req: ComposeRequest = serde_json::from_str(
            r#"{"background_with_text_path": "a.png", "foreground_path": "b.png", "blend_mode": "dissolve"}"#,
        )
        .unwrap();
        assert_eq!(req.blend(), (BlendMode::Normal, 1.0));
    }

    #[test]
    fn result_serializes_wire_names() {
        let result = CompositionResult {
            image_path: "out/a.png".into(),
            text_bounding_box: TextSize { width: 3, height: 4 },
            resolved_position: Point::new(5, 6),
            image_size: ImageSize { width: 7, height: 8 },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "image_with_text": "out/a.png",
                "text_size": {"width": 3, "height": 4},
                "position": {"x": 5, "y": 6},
                "image_size": {"width": 7, "height": 8}
            })
        );
    }
}
