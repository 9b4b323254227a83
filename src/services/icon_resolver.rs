//! Resolves dashboard icons to files in the local image directory, downloading
//! them from the configured icon sources when missing.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::services::image_metadata::ImageMetadata;

pub const DEFAULT_ICON_SOURCES: [&str; 2] = [
    "https://cdn.jsdelivr.net/gh/homarr-labs/dashboard-icons/svg",
    "https://raw.githubusercontent.com/homarr-labs/dashboard-icons/main/svg",
];

const DOWNLOAD_TIMEOUT_SECS: u64 = 5;

/// Remembers when an explicitly requested icon last failed to download.
#[derive(Debug, Default)]
pub struct FailedIconCache {
    failures: DashMap<String, DateTime<Utc>>,
}

impl FailedIconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while `icon` failed less than `window` ago. Expired failures are
    /// dropped on lookup.
    pub fn in_cooldown(&self, icon: &str, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(failed_at) = self.failures.get(icon).map(|f| *f) else {
            return false;
        };
        if now - failed_at <= window {
            return true;
        }
        self.failures
            .remove_if(icon, |_, failed_at| now - *failed_at > window);
        false
    }

    pub fn record_failure(&self, icon: &str, at: DateTime<Utc>) {
        self.failures.insert(icon.to_string(), at);
    }

    pub fn clear(&self, icon: &str) {
        self.failures.remove(icon);
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IconResolver {
    image_dir: PathBuf,
    sources: Vec<String>,
    client: reqwest::Client,
    failed_icons: FailedIconCache,
    retry_interval: Duration,
}

impl IconResolver {
    pub fn new(
        image_dir: impl Into<PathBuf>,
        sources: Vec<String>,
        retry_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            image_dir: image_dir.into(),
            sources: sources
                .into_iter()
                .map(|s| s.trim_end_matches('/').to_string())
                .collect(),
            client,
            failed_icons: FailedIconCache::new(),
            retry_interval,
        })
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Picks the icon for an image: an explicit icon wins, otherwise the image
    /// name (or the fallback) is looked up by name.
    pub async fn resolve_for_image(
        &self,
        image: &ImageMetadata,
        fallback_name: Option<&str>,
        explicit_icon: Option<&str>,
    ) -> Option<String> {
        if let Some(icon) = explicit_icon.filter(|i| !i.trim().is_empty()) {
            return self.resolve_explicit(icon).await;
        }
        let source_name = image.name.as_deref().or(fallback_name)?;
        self.resolve(source_name).await
    }

    /// Returns `{name}.svg` if it exists locally or can be downloaded from one
    /// of the sources. Never fails; exhaustion is logged and yields `None`.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        let name = normalize_icon_name(name)?;
        let filename = format!("{name}.svg");

        if self.image_dir.join(&filename).exists() {
            return Some(filename);
        }

        if self.download(&filename).await {
            Some(filename)
        } else {
            error!(icon = %filename, "All sources failed for icon.");
            None
        }
    }

    /// Keeps an explicitly supplied icon filename, downloading it when missing
    /// unless a recent attempt already failed.
    pub async fn resolve_explicit(&self, icon: &str) -> Option<String> {
        self.resolve_explicit_at(icon, Utc::now()).await
    }

    pub async fn resolve_explicit_at(&self, icon: &str, now: DateTime<Utc>) -> Option<String> {
        let icon = icon.trim();
        if !is_safe_filename(icon) {
            warn!(icon = %icon, "Rejected icon filename containing a path.");
            return None;
        }

        if self.image_dir.join(icon).exists() {
            return Some(icon.to_string());
        }

        if self
            .failed_icons
            .in_cooldown(icon, now, self.retry_interval)
        {
            debug!(icon = %icon, "Icon failed recently, skipping download.");
            return Some(icon.to_string());
        }

        if self.download(icon).await {
            self.failed_icons.clear(icon);
            info!(icon = %icon, "Downloaded explicitly provided icon.");
        } else {
            self.failed_icons.record_failure(icon, now);
            warn!(icon = %icon, "Could not download explicitly provided icon.");
        }
        Some(icon.to_string())
    }

    /// Tries every source in order and stores the first successful body.
    async fn download(&self, filename: &str) -> bool {
        for source in &self.sources {
            let url = format!("{source}/{filename}");
            debug!(url = %url, "Trying icon source.");
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %url, error = %e, "Icon request failed.");
                    continue;
                }
            };

            if response.status() != reqwest::StatusCode::OK {
                warn!(url = %url, status = %response.status(), "Icon source returned non-200 status.");
                continue;
            }

            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to read icon body.");
                    continue;
                }
            };

            match self.store(filename, &bytes).await {
                Ok(()) => {
                    info!(icon = %filename, source = %source, "Downloaded icon.");
                    return true;
                }
                Err(e) => {
                    error!(icon = %filename, error = %e, "Failed to write icon file.");
                    return false;
                }
            }
        }
        false
    }

    async fn store(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        tokio::fs::write(self.image_dir.join(filename), bytes).await
    }
}

/// Lowercases and strips a trailing `.svg`; rejects empty or path-like names.
fn normalize_icon_name(name: &str) -> Option<String> {
    let lowered = name.trim().to_lowercase();
    let stem = lowered.strip_suffix(".svg").unwrap_or(&lowered);
    if stem.is_empty() || !is_safe_filename(stem) {
        return None;
    }
    Some(stem.to_string())
}

fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}
