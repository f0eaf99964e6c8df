use crate::audio::probe_video;
use crate::config::Timeouts;
use crate::error::{ReelError, Result, Stage, with_timeout};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const PEXELS_BASE_URL: &str = "https://api.pexels.com";
pub const HD_LONG_EDGE: u32 = 1280;

/// Native geometry and length of a downloaded clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundAsset {
    pub path: PathBuf,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoVariant {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub link: String,
}

impl VideoVariant {
    fn long_edge(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(w.max(h)),
            (Some(e), None) | (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    /// HD by long edge, or by the provider's label when dimensions are missing.
    fn is_hd(&self, min_long_edge: u32) -> bool {
        match self.long_edge() {
            Some(edge) => edge >= min_long_edge,
            None => self.quality.as_deref() == Some("hd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoDescriptor {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub video_files: Vec<VideoVariant>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<VideoDescriptor>,
}

#[derive(Debug, Clone)]
pub struct FootageQuery {
    pub phrase: String,
    pub orientation: &'static str,
    pub per_page: u32,
    pub min_long_edge: u32,
    pub max_width: u32,
}

impl FootageQuery {
    pub fn portrait(phrase: &str, max_width: u32) -> Self {
        FootageQuery {
            phrase: phrase.to_string(),
            orientation: "portrait",
            per_page: 5,
            min_long_edge: HD_LONG_EDGE,
            max_width,
        }
    }
}

/// First HD variant no wider than the frame, scanning results in order;
/// otherwise the first result's first variant.
pub fn select_variant<'a>(
    videos: &'a [VideoDescriptor],
    query: &FootageQuery,
) -> Option<(&'a VideoDescriptor, &'a VideoVariant)> {
    videos
        .iter()
        .flat_map(|v| v.video_files.iter().map(move |f| (v, f)))
        .find(|(_, f)| {
            f.is_hd(query.min_long_edge) && f.width.is_none_or(|w| w <= query.max_width)
        })
        .or_else(|| {
            videos
                .iter()
                .find_map(|v| v.video_files.first().map(|f| (v, f)))
        })
}

#[async_trait]
pub trait FootageSource: Send + Sync {
    async fn search(&self, query: &FootageQuery) -> Result<Vec<VideoDescriptor>>;

    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct PexelsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PexelsClient {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        PexelsClient {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FootageSource for PexelsClient {
    async fn search(&self, query: &FootageQuery) -> Result<Vec<VideoDescriptor>> {
        let url = format!("{}/videos/search", self.base_url);
        let per_page = query.per_page.to_string();
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", query.phrase.as_str()),
                ("per_page", per_page.as_str()),
                ("orientation", query.orientation),
            ])
            .send()
            .await
            .map_err(|e| ReelError::provider(Stage::Search, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::provider(
                Stage::Search,
                format!("Pexels returned {}: {}", status, body.trim()),
            ));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ReelError::provider(Stage::Search, e))?;
        Ok(parsed.videos)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReelError::provider(Stage::Download, e))?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ReelError::provider(Stage::Download, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }
}

/// Searches, downloads and probes a background clip. `None` when the
/// search comes back empty.
pub async fn resolve_background(
    source: &dyn FootageSource,
    query: &FootageQuery,
    dir: &Path,
    timeouts: &Timeouts,
) -> Result<Option<BackgroundAsset>> {
    info!("Searching stock footage for '{}'", query.phrase);
    let videos = with_timeout(Stage::Search, timeouts.call, source.search(query)).await?;
    info!("Found {} candidate clips", videos.len());

    let Some((video, variant)) = select_variant(&videos, query) else {
        warn!("No footage for '{}'; using placeholder background", query.phrase);
        return Ok(None);
    };
    debug!(
        "Selected clip {} ({}s) as {}x{} {:?}",
        video.id,
        video.duration.unwrap_or(0.0),
        variant.width.unwrap_or(0),
        variant.height.unwrap_or(0),
        variant.quality
    );

    let dest = dir.join("background.mp4");
    with_timeout(
        Stage::Download,
        timeouts.download,
        source.download(&variant.link, &dest),
    )
    .await?;
    info!("Background downloaded to {}", dest.display());

    let asset = probe_video(&dest)
        .await
        .map_err(|e| ReelError::provider(Stage::Download, format!("{:#}", e)))?;
    info!(
        "Background clip: {}x{}, {:.2}s",
        asset.width, asset.height, asset.duration
    );
    Ok(Some(asset))
}
