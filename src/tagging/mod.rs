//! Tagging seam: metadata fetchers and tag writers.
//!
//! Fetching tags from a metadata provider and writing them into a file are
//! external collaborators; this module defines the records they exchange and
//! the registries the workflow resolves them from. Nothing is registered by
//! default — an unregistered fetcher or writer makes the tag step a logged
//! skip, not an error.

use mediamill_convert::Definition;
use std::path::{Path, PathBuf};

/// Errors raised by fetchers and writers.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("metadata fetch failed: {0}")]
    Fetch(String),

    #[error("artwork download failed: {0}")]
    Artwork(String),

    #[error("writing tags failed: {0}")]
    Write(String),
}

/// What to look up: an external id plus the season/episode pair for shows.
/// A present season means the request is for a show episode; absent means a
/// movie.
#[derive(Debug, Clone)]
pub struct TaggingInfo {
    pub id: String,
    pub id_type: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl TaggingInfo {
    pub fn is_show(&self) -> bool {
        self.season.is_some()
    }
}

/// The tag record a fetcher produces and a writer consumes.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    pub title: Option<String>,
    pub show: Option<String>,
    pub season_number: Option<u32>,
    pub season_total: Option<u32>,
    pub episode_number: Option<u32>,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub genre: Option<String>,
    pub network: Option<String>,
    pub date: Option<String>,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
    pub writers: Vec<String>,
    pub poster_url: Option<String>,
}

/// Given an id, return a tag record (and optionally fetch artwork).
pub trait MetadataFetcher: Send + Sync {
    /// Name the configuration refers to, e.g. "tmdb".
    fn name(&self) -> &str;

    fn fetch(&self, request: &TaggingInfo, language: &str) -> Result<TagSet, TagError>;

    /// Download poster artwork to a local file. Optional capability.
    fn download_artwork(&self, url: &str) -> Result<PathBuf, TagError> {
        Err(TagError::Artwork(format!(
            "{} does not support artwork downloads ({url})",
            self.name()
        )))
    }
}

/// Given a file and tags, mutate the file in place.
pub trait TagWriter: Send + Sync {
    /// Container format this writer serves, e.g. "mp4".
    fn name(&self) -> &str;

    fn write_tags(
        &self,
        file: &Path,
        tags: &TagSet,
        artwork: Option<&Path>,
        definition: Definition,
    ) -> Result<(), TagError>;
}

/// Name-keyed registries for both collaborator kinds.
#[derive(Default)]
pub struct TaggerRegistry {
    fetchers: Vec<Box<dyn MetadataFetcher>>,
    writers: Vec<Box<dyn TagWriter>>,
}

impl TaggerRegistry {
    pub fn register_fetcher(&mut self, fetcher: Box<dyn MetadataFetcher>) {
        self.fetchers.push(fetcher);
    }

    pub fn register_writer(&mut self, writer: Box<dyn TagWriter>) {
        self.writers.push(writer);
    }

    pub fn fetcher(&self, name: &str) -> Option<&dyn MetadataFetcher> {
        self.fetchers
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    pub fn writer(&self, container_ext: &str) -> Option<&dyn TagWriter> {
        self.writers
            .iter()
            .find(|w| w.name() == container_ext)
            .map(|w| w.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagging_info_show_detection() {
        let movie = TaggingInfo {
            id: "603".into(),
            id_type: "tmdb_id".into(),
            season: None,
            episode: None,
        };
        assert!(!movie.is_show());

        let episode = TaggingInfo {
            id: "75978".into(),
            id_type: "tvdb_id".into(),
            season: Some(16),
            episode: Some(19),
        };
        assert!(episode.is_show());
    }

    #[test]
    fn test_registry_lookup() {
        struct Fetcher;
        impl MetadataFetcher for Fetcher {
            fn name(&self) -> &str {
                "tmdb"
            }
            fn fetch(&self, _: &TaggingInfo, _: &str) -> Result<TagSet, TagError> {
                Ok(TagSet::default())
            }
        }

        let mut registry = TaggerRegistry::default();
        registry.register_fetcher(Box::new(Fetcher));
        assert!(registry.fetcher("tmdb").is_some());
        assert!(registry.fetcher("tvdb").is_none());
        assert!(registry.writer("mp4").is_none());
    }
}
