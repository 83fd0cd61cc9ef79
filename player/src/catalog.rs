use crate::error::PlayerError;
use crate::fetch::Fetcher;
use common::catalog::Video;
use tracing::info;

/// Downloads the video catalog. An empty catalog is an error since there is
/// nothing to play.
pub async fn load(
    fetcher: &(dyn Fetcher + Send + Sync),
    url: &str,
) -> Result<Vec<Video>, PlayerError> {
    let body = fetcher
        .get(url)
        .await
        .map_err(|e| PlayerError::CatalogFetchError(e.to_string()))?;
    let videos = parse(&body)?;
    info!("catalog: {} videos", videos.len());
    Ok(videos)
}

pub fn parse(body: &[u8]) -> Result<Vec<Video>, PlayerError> {
    // The catalog service answers `null` for an empty library.
    let videos: Option<Vec<Video>> = serde_json::from_slice(body)
        .map_err(|e| PlayerError::CatalogFetchError(format!("invalid catalog: {}", e)))?;

    match videos {
        Some(videos) if !videos.is_empty() => Ok(videos),
        _ => Err(PlayerError::CatalogFetchError(
            "No videos found in catalog.".to_string(),
        )),
    }
}
