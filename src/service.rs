use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::compose::layers::{LayerCompositor, TextLayer, compose};
use crate::compose::position::PositionResolver;
use crate::compose::suggest::suggest_positions;
use crate::compose::template;
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::geometry::ImageSize;
use crate::processing::color::parse_color_or_white;
use crate::request::{
    AddTextRequest, ComposeRequest, ComposeResponse, CompositionResult, DramaticTextRequest,
    LayersResponse, MultiLayerRequest, SuggestRequest, SuggestResponse, TemplateRequest,
    TemplateResponse,
};
use crate::sink::{ImageSink, PngSink};
use crate::source::{ImageSource, LocalImageSource};
use crate::text::font::FontResolver;
use crate::text::raster::measure;

/// Request-level entry points. Images are resolved up front, then all pixel
/// work runs on the blocking pool against request-owned buffers.
pub struct CompositionService<S> {
    source: S,
    output: Arc<dyn ImageSink>,
    public: Arc<dyn ImageSink>,
    compositor: LayerCompositor,
    max_font_size: u32,
}

impl CompositionService<LocalImageSource> {
    pub fn from_config(cfg: &Configuration, cancel: CancellationToken) -> Self {
        let fonts = Arc::new(FontResolver::from_config(cfg));
        Self::new(
            LocalImageSource::from_config(cfg, cancel),
            Arc::new(PngSink::new(cfg.output_path())),
            Arc::new(PngSink::new(cfg.public_path())),
            LayerCompositor::new(fonts, PositionResolver::new(cfg.vertical_adjustment)),
            cfg.max_font_size,
        )
    }
}

impl<S: ImageSource> CompositionService<S> {
    pub fn new(
        source: S,
        output: Arc<dyn ImageSink>,
        public: Arc<dyn ImageSink>,
        compositor: LayerCompositor,
        max_font_size: u32,
    ) -> Self {
        Self {
            source,
            output,
            public,
            compositor,
            max_font_size,
        }
    }

    async fn load(&self, reference: &str, phase: &'static str) -> Result<RgbaImage> {
        self.source
            .resolve(reference)
            .await
            .map_err(|source| Error::Resolution {
                reference: reference.to_string(),
                phase,
                source,
            })
    }

    pub async fn add_text(&self, request: AddTextRequest) -> Result<CompositionResult> {
        let (background_ref, layer) = request.into_layer(self.max_font_size)?;
        info!(background = %background_ref, text = %layer.text, "adding text");
        self.render_single(background_ref, layer).await
    }

    pub async fn add_dramatic_text(&self, request: DramaticTextRequest) -> Result<CompositionResult> {
        let (background_ref, layer) = request.into_layer(self.max_font_size)?;
        info!(background = %background_ref, text = %layer.text, "adding dramatic text");
        self.render_single(background_ref, layer).await
    }

    async fn render_single(
        &self,
        background_ref: String,
        layer: TextLayer,
    ) -> Result<CompositionResult> {
        let background = self.load(&background_ref, "background").await?;
        let hint = format!("{}_text", stem(&background_ref));
        let compositor = self.compositor.clone();
        let sink = Arc::clone(&self.output);
        task::spawn_blocking(move || -> Result<CompositionResult> {
            compositor.check_layers(std::slice::from_ref(&layer))?;
            let image_size = ImageSize::of(&background);
            let rendered = compositor.render_layers(&background, std::slice::from_ref(&layer));
            let text_size = rendered
                .placements
                .first()
                .map(|placement| placement.text_size)
                .unwrap_or_default();
            let image_path = sink.save(&rendered.canvas, &hint)?;
            Ok(CompositionResult {
                image_path,
                text_bounding_box: text_size,
                resolved_position: layer.anchor,
                image_size,
            })
        })
        .await?
    }

    pub async fn add_text_layers(&self, request: MultiLayerRequest) -> Result<LayersResponse> {
        let (background_ref, layers) = request.into_layers(self.max_font_size)?;
        info!(background = %background_ref, layers = layers.len(), "adding text layers");
        let background = self.load(&background_ref, "background").await?;
        let compositor = self.compositor.clone();
        let sink = Arc::clone(&self.output);
        task::spawn_blocking(move || -> Result<LayersResponse> {
            compositor.check_layers(&layers)?;
            let rendered = compositor.render_layers(&background, &layers);
            let degraded = rendered
                .placements
                .iter()
                .filter(|placement| placement.degradation.is_some())
                .count();
            if degraded > 0 {
                warn!(degraded, "some layers were drawn without their effect");
            }
            let image_with_text = sink.save(&rendered.canvas, "multilayer")?;
            Ok(LayersResponse { image_with_text })
        })
        .await?
    }

    pub async fn compose_final(&self, request: ComposeRequest) -> Result<ComposeResponse> {
        request.validate()?;
        let (mode, opacity) = request.blend();
        info!(
            background = %request.background_with_text_path,
            foreground = %request.foreground_path,
            ?mode,
            opacity,
            "composing final image"
        );
        let background = self
            .load(&request.background_with_text_path, "background")
            .await?;
        let foreground = self.load(&request.foreground_path, "foreground").await?;
        let sink = Arc::clone(&self.public);
        task::spawn_blocking(move || -> Result<ComposeResponse> {
            let composed = compose(&background, &foreground, mode, opacity)?;
            let final_image = sink.save(&composed, "composed")?;
            Ok(ComposeResponse { final_image })
        })
        .await?
    }

    pub async fn fit_template(&self, request: TemplateRequest) -> Result<TemplateResponse> {
        if request.foreground_path.trim().is_empty() {
            return Err(Error::InvalidParameter {
                field: "foreground_path",
                reason: "image reference must not be empty".to_string(),
            });
        }
        info!(foreground = %request.foreground_path, template = %request.template, "fitting template");
        let foreground = self.load(&request.foreground_path, "foreground").await?;
        let background = parse_color_or_white(&request.background_color);
        let sink = Arc::clone(&self.output);
        task::spawn_blocking(move || -> Result<TemplateResponse> {
            let canvas = template::fit(
                &foreground,
                &request.template,
                background,
                request.padding_percent,
            )?;
            let template_image = sink.save(&canvas, &format!("template_{}", request.template))?;
            Ok(TemplateResponse {
                template_image,
                width: canvas.width(),
                height: canvas.height(),
            })
        })
        .await?
    }

    pub async fn suggest_positions(&self, request: SuggestRequest) -> Result<SuggestResponse> {
        let text = request.text()?.to_string();
        let size = request.font_size.clamp(1, self.max_font_size.max(1) as i64) as u32;
        let background = self.load(&request.background_path, "background").await?;
        let compositor = self.compositor.clone();
        let font_name = request.font_name;
        task::spawn_blocking(move || -> Result<SuggestResponse> {
            let font = compositor.fonts().resolve(&font_name, size);
            LayerCompositor::check_extent(&text, &font)?;
            let text_size = measure(&text, &font);
            let suggestions = suggest_positions(&background, text_size);
            Ok(SuggestResponse {
                text_size,
                suggestions,
            })
        })
        .await?
    }
}

/// File stem of a path or URL, used to name derived outputs.
fn stem(reference: &str) -> String {
    let last = reference
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(reference);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    Path::new(last)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_paths_and_urls() {
        assert_eq!(stem("/uploads/background/abc.png"), "abc");
        assert_eq!(stem("https://cdn.example.com/x/y.jpg?sig=1"), "y");
        assert_eq!(stem(""), "image");
    }
}
