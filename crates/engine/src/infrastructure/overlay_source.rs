//! Overlay document source: remote URL with a bundled fallback copy.
//!
//! The overlay corrects upstream data, so serving a slightly older bundled
//! copy is always better than serving none. Loading therefore never fails:
//! one remote attempt, and on any failure the copy shipped with the binary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use questlog_domain::Overlay;

use crate::infrastructure::ports::{FetchError, OverlaySourcePort};

/// Default location of the community-maintained overlay document.
pub const DEFAULT_OVERLAY_URL: &str =
    "https://raw.githubusercontent.com/WrldBld/questlog-overlay/main/overlay.json";

const BUNDLED_OVERLAY: &str = include_str!("../../resources/overlay.json");

pub struct HttpOverlaySource {
    client: Client,
    url: Url,
}

impl HttpOverlaySource {
    pub fn new(url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, url }
    }

    /// The overlay snapshot shipped with the binary.
    pub fn bundled() -> Overlay {
        Overlay::from_json(BUNDLED_OVERLAY).unwrap_or_else(|err| {
            // The bundled document is part of the build; failing to parse it
            // is a packaging defect, but an empty overlay still beats a crash.
            tracing::error!("bundled overlay does not parse: {err}");
            Overlay::default()
        })
    }

    async fn fetch_remote(&self) -> Result<Overlay, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        Overlay::from_json(&body).map_err(|err| FetchError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl OverlaySourcePort for HttpOverlaySource {
    async fn load(&self) -> Overlay {
        match self.fetch_remote().await {
            Ok(overlay) => overlay,
            Err(err) => {
                tracing::warn!("overlay fetch failed, using bundled copy: {err}");
                Self::bundled()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_overlay_parses() {
        let overlay = Overlay::from_json(BUNDLED_OVERLAY).expect("bundled overlay");
        assert!(overlay.meta.is_some());
        assert!(!overlay.tasks.is_empty());
    }

    #[test]
    fn bundled_accessor_never_panics() {
        let overlay = HttpOverlaySource::bundled();
        assert!(!overlay.tasks.is_empty());
    }
}
