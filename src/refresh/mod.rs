//! Library refreshers: fire-and-forget HTTP notifications to media servers
//! after new content lands.

mod plex;
mod sickrage;

pub use plex::PlexRefresher;
pub use sickrage::SickrageRefresher;

use crate::config::RefresherConfig;
use anyhow::Result;

pub trait Refresher: Send + Sync {
    fn name(&self) -> &str;

    fn refresh(&self) -> Result<()>;
}

/// Resolve a configured refresher by name. Disabled entries, unknown names,
/// and incomplete configurations yield None with a log line.
pub fn build(name: &str, config: &RefresherConfig) -> Option<Box<dyn Refresher>> {
    if !config.refresh {
        tracing::debug!("refresher {name} is disabled in configuration");
        return None;
    }
    match name.to_lowercase().as_str() {
        "plex" => PlexRefresher::new(config).map(|r| Box::new(r) as Box<dyn Refresher>),
        "sickrage" => SickrageRefresher::new(config).map(|r| Box::new(r) as Box<dyn Refresher>),
        other => {
            tracing::warn!("no refresher implementation named {other:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_credentials() {
        let config = RefresherConfig {
            refresh: true,
            ..RefresherConfig::default()
        };
        assert!(build("plex", &config).is_none());
        assert!(build("sickrage", &config).is_none());
        assert!(build("jellyfin", &config).is_none());
    }

    #[test]
    fn test_build_disabled_entry() {
        let config = RefresherConfig {
            refresh: false,
            token: Some("abc".to_string()),
            ..RefresherConfig::default()
        };
        assert!(build("plex", &config).is_none());
    }

    #[test]
    fn test_build_with_credentials() {
        let config = RefresherConfig {
            refresh: true,
            token: Some("abc".to_string()),
            ..RefresherConfig::default()
        };
        assert!(build("plex", &config).is_some());

        let config = RefresherConfig {
            refresh: true,
            api_key: Some("xyz".to_string()),
            ..RefresherConfig::default()
        };
        assert!(build("sickrage", &config).is_some());
    }
}
