use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::ResolveError;

/// Turns an image reference (path, `/uploads/...` path, or URL) into pixels.
pub trait ImageSource: Send + Sync {
    fn resolve(&self, reference: &str) -> impl Future<Output = Result<RgbaImage, ResolveError>> + Send;
}

/// Reads local files and fetches `http(s)` URLs. Fetches are bounded by a
/// timeout and abort when the token is cancelled; nothing is retried.
#[derive(Debug, Clone)]
pub struct LocalImageSource {
    base_dir: PathBuf,
    uploads_dir: PathBuf,
    fetch_timeout: Duration,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl LocalImageSource {
    pub fn new(base_dir: impl Into<PathBuf>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            uploads_dir: uploads_dir.into(),
            fetch_timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &Configuration, cancel: CancellationToken) -> Self {
        Self::new(&cfg.base_dir, cfg.uploads_path())
            .with_fetch_timeout(cfg.fetch_timeout)
            .with_cancellation(cancel)
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Local paths tried for `reference`, in order.
    pub fn candidates(&self, reference: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(reference)];
        if let Some(rest) = reference.strip_prefix("/uploads/") {
            paths.push(self.base_dir.join("uploads").join(rest));
            paths.push(self.uploads_dir.join(rest));
        } else if Path::new(reference).is_relative() {
            paths.push(self.base_dir.join(reference));
        }
        paths.dedup();
        paths
    }

    async fn read_local(&self, reference: &str) -> Result<RgbaImage, ResolveError> {
        let tried = self.candidates(reference);
        let Some(path) = tried.iter().find(|path| path.is_file()).cloned() else {
            return Err(ResolveError::NotFound {
                reference: reference.to_string(),
                tried,
            });
        };
        debug!(reference, path = %path.display(), "reading local image");
        let owned = reference.to_string();
        run_decode(reference, move || {
            let reader = ImageReader::open(&path)?.with_guessed_format()?;
            decode_oriented(reader)
        })
        .await
        .map_err(|source| ResolveError::Decode {
            reference: owned,
            source,
        })
    }

    async fn fetch(&self, url: &str) -> Result<RgbaImage, ResolveError> {
        info!(url, timeout = ?self.fetch_timeout, "fetching remote image");
        let request = async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            response.bytes().await
        };
        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(ResolveError::Cancelled { url: url.to_string() });
            }
            outcome = tokio::time::timeout(self.fetch_timeout, request) => match outcome {
                Err(_) => {
                    return Err(ResolveError::Timeout {
                        url: url.to_string(),
                        after: self.fetch_timeout,
                    });
                }
                Ok(Err(err)) => {
                    return Err(ResolveError::FetchFailed {
                        url: url.to_string(),
                        reason: err.to_string(),
                    });
                }
                Ok(Ok(bytes)) => bytes,
            },
        };
        debug!(url, bytes = bytes.len(), "fetched remote image");
        run_decode(url, move || {
            let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
            decode_oriented(reader)
        })
        .await
        .map_err(|source| ResolveError::Decode {
            reference: url.to_string(),
            source,
        })
    }
}

impl ImageSource for LocalImageSource {
    async fn resolve(&self, reference: &str) -> Result<RgbaImage, ResolveError> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch(reference).await
        } else {
            self.read_local(reference).await
        }
    }
}

fn decode_oriented<R>(reader: ImageReader<R>) -> image::ImageResult<RgbaImage>
where
    R: std::io::BufRead + std::io::Seek,
{
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img.to_rgba8())
}

async fn run_decode<F>(reference: &str, decode: F) -> image::ImageResult<RgbaImage>
where
    F: FnOnce() -> image::ImageResult<RgbaImage> + Send + 'static,
{
    match tokio::task::spawn_blocking(decode).await {
        Ok(result) => result,
        Err(err) => {
            debug!(reference, "decode worker failed: {err}");
            Err(image::ImageError::IoError(std::io::Error::other(err)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn uploads_paths_try_every_root() {
        let source = LocalImageSource::new("/srv/app", "/data/uploads");
        assert_eq!(
            source.candidates("/uploads/a.png"),
            vec![
                PathBuf::from("/uploads/a.png"),
                PathBuf::from("/srv/app/uploads/a.png"),
                PathBuf::from("/data/uploads/a.png"),
            ]
        );
        assert_eq!(
            source.candidates("img/b.png"),
            vec![PathBuf::from("img/b.png"), PathBuf::from("/srv/app/img/b.png")]
        );
        assert_eq!(source.candidates("/abs/c.png"), vec![PathBuf::from("/abs/c.png")]);
    }

    #[tokio::test]
    async fn resolves_uploads_path_from_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]));
        img.save(dir.path().join("uploads/bg.png")).unwrap();

        let source = LocalImageSource::new(dir.path(), dir.path().join("elsewhere"));
        let loaded = source.resolve("/uploads/bg.png").await.unwrap();
        assert_eq!(loaded, img);
    }

    #[tokio::test]
    async fn missing_file_reports_tried_paths() {
        let source = LocalImageSource::new("/nonexistent-base", "/nonexistent-uploads");
        let err = source.resolve("/uploads/nope.png").await.unwrap_err();
        match err {
            ResolveError::NotFound { tried, .. } => assert_eq!(tried.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let source = LocalImageSource::new(dir.path(), dir.path());
        let err = source.resolve(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Decode { .. }));
    }

    #[tokio::test]
    async fn cancelled_fetch_fails_cleanly() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = LocalImageSource::new(".", "uploads").with_cancellation(cancel);
        let err = source.resolve("http://127.0.0.1:9/bg.png").await.unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // the backlog completes the handshake; nothing ever answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/bg.png", listener.local_addr().unwrap());
        let source =
            LocalImageSource::new(".", "uploads").with_fetch_timeout(Duration::from_millis(200));
        let err = source.resolve(&url).await.unwrap_err();
        match err {
            ResolveError::Timeout { after, .. } => assert_eq!(after, Duration::from_millis(200)),
            other => panic!("unexpected error: {other}"),
        }
        drop(listener);
    }
}
