use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use rand::Rng;
use tracing::info;

use crate::error::{Error, Result};

/// Persists a finished canvas and reports where it went.
pub trait ImageSink: Send + Sync {
    fn save(&self, canvas: &RgbaImage, hint: &str) -> Result<PathBuf>;
}

/// Writes lossless PNGs named `{hint}_{unix-seconds}_{8 hex}.png`.
#[derive(Debug, Clone)]
pub struct PngSink {
    dir: PathBuf,
}

impl PngSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(hint: &str) -> String {
        let hint: String = hint
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let hint = if hint.is_empty() { "image" } else { hint.as_str() };
        let stamp = chrono::Utc::now().timestamp();
        let suffix: u32 = rand::rng().random();
        format!("{hint}_{stamp}_{suffix:08x}.png")
    }
}

impl ImageSink for PngSink {
    fn save(&self, canvas: &RgbaImage, hint: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(hint));
        canvas
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| Error::Save {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), width = canvas.width(), height = canvas.height(), "saved image");
        Ok(path)
    }
}
