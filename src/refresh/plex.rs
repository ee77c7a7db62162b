use crate::config::RefresherConfig;
use anyhow::Result;
use reqwest::blocking::Client;
use std::time::Duration;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Triggers a Plex library scan over its HTTP API.
pub struct PlexRefresher {
    client: Client,
    base_url: String,
    token: String,
}

impl PlexRefresher {
    pub fn new(config: &RefresherConfig) -> Option<Self> {
        let Some(token) = config.token.clone() else {
            tracing::warn!("plex refresher configured without a token, skipping");
            return None;
        };

        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Some(Self {
            client,
            base_url: config.base_url(),
            token,
        })
    }
}

impl super::Refresher for PlexRefresher {
    fn name(&self) -> &str {
        "plex"
    }

    fn refresh(&self) -> Result<()> {
        let url = format!(
            "{}/library/sections/all/refresh?X-Plex-Token={}",
            self.base_url, self.token
        );

        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("plex refresh failed ({status}): {body}");
        }

        tracing::info!("plex library refresh triggered");
        Ok(())
    }
}
