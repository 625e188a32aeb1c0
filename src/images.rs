use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::utils::error::ImageDownloadError;

const UNSAFE_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

static UNSAFE_PATH_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).ok());

/// Make a product name usable as a directory name on every OS.
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned = match UNSAFE_PATH_CHARS.as_ref() {
        Some(pattern) => pattern.replace_all(name, "").into_owned(),
        None => name.replace(UNSAFE_CHARS, ""),
    };
    let cleaned = cleaned.trim().replace(' ', "_");
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// File extension from the URL path; `jpg` when missing or implausibly long.
pub fn image_extension(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split('?').next().unwrap_or_default().to_string());

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= 4 => {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// Downloads product images into `<images_dir>/<product folder>/<n>.<ext>`.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
    images_dir: PathBuf,
}

impl ImageDownloader {
    pub fn new(client: Client, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            images_dir: images_dir.into(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Fetch one image; `position` is 1-based and names the file.
    pub async fn download(
        &self,
        url: &str,
        folder: &str,
        position: usize,
    ) -> Result<String, ImageDownloadError> {
        if Url::parse(url).is_err() {
            return Err(ImageDownloadError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let request_err = |message: String| ImageDownloadError::Request {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| request_err(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_err(e.to_string()))?;

        let target_dir = self.images_dir.join(sanitize_folder_name(folder));
        let path = target_dir.join(format!("{}.{}", position, image_extension(url)));
        let write_err = |source: std::io::Error| ImageDownloadError::Write {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(write_err)?;
        tokio::fs::write(&path, &bytes).await.map_err(write_err)?;
        let absolute = tokio::fs::canonicalize(&path).await.map_err(write_err)?;

        debug!("Saved image {} -> {}", url, absolute.display());
        Ok(absolute.to_string_lossy().to_string())
    }

    /// Download every image in order. Failures are logged and left out; they never fail
    /// the product.
    pub async fn download_all(&self, urls: &[String], folder: &str) -> Vec<String> {
        let mut saved = Vec::with_capacity(urls.len());
        for (idx, url) in urls.iter().enumerate() {
            match self.download(url, folder, idx + 1).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    metrics::counter!("woo_scraper_image_failures_total").increment(1);
                    warn!("Image skipped for '{}': {}", folder, e);
                }
            }
        }
        saved
    }
}
