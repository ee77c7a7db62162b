use crate::config::RefresherConfig;
use anyhow::Result;
use reqwest::blocking::Client;
use std::time::Duration;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Asks Sickrage to rescan its shows through the keyed API.
pub struct SickrageRefresher {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SickrageRefresher {
    pub fn new(config: &RefresherConfig) -> Option<Self> {
        let Some(api_key) = config.api_key.clone() else {
            tracing::warn!("sickrage refresher configured without an api key, skipping");
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
            api_key,
        })
    }
}

impl super::Refresher for SickrageRefresher {
    fn name(&self) -> &str {
        "sickrage"
    }

    fn refresh(&self) -> Result<()> {
        let url = format!(
            "{}/api/{}/?cmd=show.refresh",
            self.base_url, self.api_key
        );

        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("sickrage refresh failed ({status}): {body}");
        }

        tracing::info!("sickrage show refresh triggered");
        Ok(())
    }
}
