//! The job workflow: a fixed post-conversion sequence driven by guarded
//! transitions.
//!
//! A job moves process → tag → postprocess → deploy → delete → refresh →
//! finish. The driver always fires every trigger in that order; guard
//! predicates decide whether a step actually runs, and a step whose guard
//! fails is a no-op rather than an error. Only conversion itself and the
//! deploy rename are fatal: once bytes exist, losing them to an ancillary
//! failure would be worse than skipping a secondary step.

use crate::config::Config;
use crate::postprocess::PostProcessor;
use crate::processor::Conversion;
use crate::refresh::Refresher;
use crate::tagging::{TaggerRegistry, TaggingInfo};
use mediamill_convert::container::Container;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Errors that end a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Convert(#[from] mediamill_convert::Error),

    #[error("deploy failed: {0}")]
    Deploy(String),
}

/// Workflow states, in driver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Initialised,
    Processed,
    Tagged,
    PostProcessed,
    Deployed,
    Deleted,
    Refreshed,
    Finished,
}

/// One conversion job: source file, working paths, and post-conversion
/// directives resolved from configuration.
pub struct Job {
    state: JobState,
    input: PathBuf,
    work_dir: PathBuf,
    work_file: PathBuf,
    target_ext: String,
    tagging_info: Option<TaggingInfo>,
    copy_to: Option<PathBuf>,
    move_to: Option<PathBuf>,
    delete_original: bool,
    permissions: u32,
    refreshers: Vec<Box<dyn Refresher>>,
    /// Set by a successful conversion; describes the working file.
    output: Option<Container>,
    /// The deployed file after the rename step.
    final_file: Option<PathBuf>,
}

impl Job {
    /// Build a job for `input` targeting the configured container `target`.
    /// Refresher names in `notify` are resolved against the config; unknown
    /// names are dropped with a warning.
    pub fn new(
        input: &Path,
        target: &str,
        config: &Config,
        tagging_info: Option<TaggingInfo>,
        notify: &[String],
    ) -> Result<Self, JobError> {
        if !config.containers.contains_key(target) {
            return Err(JobError::Config(format!(
                "unsupported container {target:?}, valid containers are {:?}",
                config.containers.keys().collect::<Vec<_>>()
            )));
        }
        if !input.is_file() {
            return Err(JobError::Config(format!(
                "input file {} does not exist",
                input.display()
            )));
        }

        let target_ext = target
            .parse::<mediamill_convert::ContainerFormat>()
            .map(|f| f.extension().to_string())
            .map_err(JobError::Convert)?;

        let work_dir = match &config.file.work_directory {
            Some(dir) if dir.is_dir() => dir.clone(),
            Some(dir) => {
                tracing::warn!(
                    "work directory {} unusable, using the source's directory",
                    dir.display()
                );
                default_work_dir(input)
            }
            None => default_work_dir(input),
        };

        let copy_to = config.file.copy_to.clone().filter(|d| d.is_dir());
        // Copy wins over move; at most one deploy directive is active.
        let move_to = config
            .file
            .move_to
            .clone()
            .filter(|d| copy_to.is_none() && d.is_dir());

        let stem = file_stem(input);
        let work_file = work_dir.join(format!("{stem}-working.{target_ext}"));

        let mut refreshers: Vec<Box<dyn Refresher>> = Vec::new();
        for name in notify {
            match config.refreshers.get(name) {
                Some(cfg) => {
                    if let Some(refresher) = crate::refresh::build(name, cfg) {
                        refreshers.push(refresher);
                    }
                }
                None => tracing::warn!("no configured refresher named {name:?}"),
            }
        }

        Ok(Self {
            state: JobState::Initialised,
            input: input.to_path_buf(),
            work_dir,
            work_file,
            target_ext,
            tagging_info,
            copy_to,
            move_to,
            delete_original: config.file.delete_original,
            permissions: config.file.mode(),
            refreshers,
            output: None,
            final_file: None,
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn work_file(&self) -> &Path {
        &self.work_file
    }

    /// Where the converted file ended up after deploy, if it ran.
    pub fn final_file(&self) -> Option<&Path> {
        self.final_file.as_deref()
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn conversion_success(&self) -> bool {
        self.output
            .as_ref()
            .map(|c| c.path().exists())
            .unwrap_or(false)
    }

    fn has_tag_info(&self) -> bool {
        self.tagging_info.is_some()
    }

    fn has_refresher(&self) -> bool {
        !self.refreshers.is_empty()
    }

    // ------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------

    /// Convert the source into the working file. Conversion errors are fatal
    /// for the job; the working file is left behind for diagnostics.
    pub fn process(&mut self, conversion: &Conversion, cancel: &AtomicBool) -> Result<(), JobError> {
        if self.state != JobState::Initialised {
            return Ok(());
        }

        let output = conversion.run(&self.input, &self.work_file, cancel, |fraction| {
            tracing::info!("converting: {:3.0}%", fraction * 100.0);
        })?;

        self.output = Some(output);
        self.state = JobState::Processed;
        Ok(())
    }

    /// Fetch tags and write them into the converted file. Failures are
    /// logged and swallowed.
    pub fn tag(&mut self, taggers: &TaggerRegistry, config: &Config) {
        if self.state != JobState::Processed
            || !self.conversion_success()
            || !self.has_tag_info()
        {
            return;
        }

        if let Err(e) = self.run_tagging(taggers, config) {
            tracing::error!("tagging failed (continuing): {e}");
        }
        self.state = JobState::Tagged;
    }

    fn run_tagging(&self, taggers: &TaggerRegistry, config: &Config) -> anyhow::Result<()> {
        if !config.tagging.tagfile {
            tracing::info!("file tagging is disabled in configuration, skipping");
            return Ok(());
        }

        let info = self.tagging_info.as_ref().expect("guarded by has_tag_info");
        let output = self.output.as_ref().expect("guarded by conversion_success");

        let fetcher_name = if info.is_show() {
            &config.tagging.preferred_show_tagger
        } else {
            &config.tagging.preferred_movie_tagger
        };
        let Some(fetcher) = taggers.fetcher(fetcher_name) else {
            tracing::info!("no metadata fetcher registered as {fetcher_name:?}, skipping tag");
            return Ok(());
        };
        let Some(writer) = taggers.writer(&self.target_ext) else {
            tracing::info!(
                "tagging not supported for {} files at this time, skipping",
                self.target_ext
            );
            return Ok(());
        };

        let tags = fetcher.fetch(info, &config.languages.tagging)?;

        let artwork = match (&tags.poster_url, config.tagging.download_artwork) {
            (Some(url), true) => match fetcher.download_artwork(url) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("artwork download failed: {e}");
                    None
                }
            },
            _ => None,
        };

        writer.write_tags(output.path(), &tags, artwork.as_deref(), output.definition())?;
        Ok(())
    }

    /// Run the container's configured post-processors. Failures are logged
    /// and swallowed.
    pub fn postprocess(&mut self, processors: &[Box<dyn PostProcessor>]) {
        if !matches!(self.state, JobState::Processed | JobState::Tagged)
            || !self.conversion_success()
        {
            return;
        }

        let output = self.output.as_ref().expect("guarded by conversion_success");
        for processor in processors {
            if let Err(e) = processor.process(output.path()) {
                tracing::error!("post-processor {} failed (continuing): {e}", processor.name());
            }
        }
        self.state = JobState::PostProcessed;
    }

    /// Rename the working file to its final name, then copy or move it to
    /// the configured directory. The rename is fatal on failure; the
    /// copy/move is logged and swallowed.
    pub fn deploy(&mut self) -> Result<(), JobError> {
        if !matches!(
            self.state,
            JobState::Processed | JobState::Tagged | JobState::PostProcessed
        ) || !self.conversion_success()
        {
            return Ok(());
        }

        let file_name = format!("{}.{}", file_stem(&self.input), self.target_ext);
        let final_file = self.work_dir.join(&file_name);
        std::fs::rename(&self.work_file, &final_file).map_err(|e| {
            JobError::Deploy(format!(
                "renaming {} to {}: {e}",
                self.work_file.display(),
                final_file.display()
            ))
        })?;
        self.final_file = Some(final_file.clone());

        if let Some(dir) = &self.copy_to {
            let dest = dir.join(&file_name);
            match std::fs::copy(&final_file, &dest) {
                Ok(_) => tracing::info!("copied to {}", dest.display()),
                Err(e) => tracing::error!("copy to {} failed (continuing): {e}", dest.display()),
            }
        } else if let Some(dir) = &self.move_to {
            let dest = dir.join(&file_name);
            if let Err(e) = move_file(&final_file, &dest) {
                tracing::error!("move to {} failed (continuing): {e}", dest.display());
            } else {
                tracing::info!("moved to {}", dest.display());
                self.final_file = Some(dest);
            }
        }

        self.state = JobState::Deployed;
        Ok(())
    }

    /// Remove the source file. Failures are logged; the job still finishes.
    pub fn delete(&mut self) {
        if !matches!(self.state, JobState::PostProcessed | JobState::Deployed)
            || !self.delete_original
        {
            return;
        }

        set_mode(&self.input, self.permissions);
        match std::fs::remove_file(&self.input) {
            Ok(()) => {
                tracing::info!("deleted source {}", self.input.display());
                self.state = JobState::Deleted;
            }
            Err(e) => {
                tracing::error!("could not delete source {}: {e}", self.input.display());
                self.state = JobState::Deleted;
            }
        }
    }

    /// Fire every configured refresher. Failures are logged and swallowed.
    pub fn refresh(&mut self) {
        if !matches!(
            self.state,
            JobState::Processed | JobState::Tagged | JobState::Deployed | JobState::Deleted
        ) || !self.has_refresher()
        {
            return;
        }

        for refresher in &self.refreshers {
            if let Err(e) = refresher.refresh() {
                tracing::error!("refresher {} failed (continuing): {e}", refresher.name());
            }
        }
        self.state = JobState::Refreshed;
    }

    pub fn finish(&mut self) {
        if matches!(
            self.state,
            JobState::Processed
                | JobState::Tagged
                | JobState::PostProcessed
                | JobState::Deployed
                | JobState::Deleted
                | JobState::Refreshed
        ) {
            self.state = JobState::Finished;
        }
    }

    /// Drive every trigger in the fixed order.
    pub fn run(
        &mut self,
        conversion: &Conversion,
        taggers: &TaggerRegistry,
        processors: &[Box<dyn PostProcessor>],
        config: &Config,
        cancel: &AtomicBool,
    ) -> Result<(), JobError> {
        self.process(conversion, cancel)?;
        self.tag(taggers, config);
        self.postprocess(processors);
        self.deploy()?;
        self.delete();
        self.refresh();
        self.finish();
        Ok(())
    }
}

fn default_work_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn set_mode(path: &Path, mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
            tracing::debug!("could not chmod {}: {e}", path.display());
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::TagSet;
    use mediamill_convert::container::ContainerFormat;
    use std::sync::Mutex;

    fn job_with_output(dir: &tempfile::TempDir, converted: bool) -> Job {
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"source").unwrap();
        let work_file = dir.path().join("movie-working.mp4");
        if converted {
            std::fs::write(&work_file, b"converted").unwrap();
        }

        Job {
            state: if converted {
                JobState::Processed
            } else {
                JobState::Initialised
            },
            input,
            work_dir: dir.path().to_path_buf(),
            work_file: work_file.clone(),
            target_ext: "mp4".to_string(),
            tagging_info: None,
            copy_to: None,
            move_to: None,
            delete_original: false,
            permissions: 0o777,
            refreshers: Vec::new(),
            output: converted.then(|| Container::new(ContainerFormat::Mp4, work_file)),
            final_file: None,
        }
    }

    struct CountingRefresher(Mutex<u32>);

    impl Refresher for CountingRefresher {
        fn name(&self) -> &str {
            "counting"
        }
        fn refresh(&self) -> anyhow::Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_deploy_renames_working_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.deploy().unwrap();

        assert_eq!(job.state(), JobState::Deployed);
        assert!(dir.path().join("movie.mp4").exists());
        assert!(!dir.path().join("movie-working.mp4").exists());
    }

    #[test]
    fn test_deploy_copy_wins() {
        let dir = tempfile::tempdir().unwrap();
        let copy_dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.copy_to = Some(copy_dir.path().to_path_buf());
        job.deploy().unwrap();

        assert!(copy_dir.path().join("movie.mp4").exists());
        // The renamed file stays in the work directory after a copy.
        assert!(dir.path().join("movie.mp4").exists());
    }

    #[test]
    fn test_deploy_move() {
        let dir = tempfile::tempdir().unwrap();
        let move_dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.move_to = Some(move_dir.path().to_path_buf());
        job.deploy().unwrap();

        assert!(move_dir.path().join("movie.mp4").exists());
        assert!(!dir.path().join("movie.mp4").exists());
    }

    #[test]
    fn test_deploy_noop_without_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, false);
        job.deploy().unwrap();
        assert_eq!(job.state(), JobState::Initialised);
    }

    #[test]
    fn test_deploy_rename_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        // The guard still passes (the converted file exists) but the rename
        // source is gone.
        job.work_file = dir.path().join("not-there.mp4");
        assert!(matches!(job.deploy(), Err(JobError::Deploy(_))));
    }

    #[test]
    fn test_delete_requires_flag_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.deploy().unwrap();

        // Flag off: no-op.
        job.delete();
        assert!(job.input.exists());
        assert_eq!(job.state(), JobState::Deployed);

        job.delete_original = true;
        job.delete();
        assert!(!job.input.exists());
        assert_eq!(job.state(), JobState::Deleted);
    }

    #[test]
    fn test_refresh_fires_each_refresher() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.refreshers.push(Box::new(CountingRefresher(Mutex::new(0))));
        job.refresh();
        assert_eq!(job.state(), JobState::Refreshed);
    }

    #[test]
    fn test_refresh_noop_without_refreshers() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.refresh();
        assert_eq!(job.state(), JobState::Processed);
    }

    #[test]
    fn test_tag_noop_without_info() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        let taggers = TaggerRegistry::default();
        let config = Config::default();
        job.tag(&taggers, &config);
        assert_eq!(job.state(), JobState::Processed);
    }

    #[test]
    fn test_tag_with_stub_registry() {
        struct StubFetcher;
        impl crate::tagging::MetadataFetcher for StubFetcher {
            fn name(&self) -> &str {
                "tmdb"
            }
            fn fetch(
                &self,
                _request: &TaggingInfo,
                _language: &str,
            ) -> Result<TagSet, crate::tagging::TagError> {
                Ok(TagSet {
                    title: Some("Movie".to_string()),
                    ..TagSet::default()
                })
            }
        }

        struct StubWriter;
        impl crate::tagging::TagWriter for StubWriter {
            fn name(&self) -> &str {
                "mp4"
            }
            fn write_tags(
                &self,
                _file: &Path,
                tags: &TagSet,
                _artwork: Option<&Path>,
                _definition: mediamill_convert::Definition,
            ) -> Result<(), crate::tagging::TagError> {
                assert_eq!(tags.title.as_deref(), Some("Movie"));
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.tagging_info = Some(TaggingInfo {
            id: "603".to_string(),
            id_type: "tmdb_id".to_string(),
            season: None,
            episode: None,
        });

        let mut taggers = TaggerRegistry::default();
        taggers.register_fetcher(Box::new(StubFetcher));
        taggers.register_writer(Box::new(StubWriter));

        job.tag(&taggers, &Config::default());
        assert_eq!(job.state(), JobState::Tagged);
    }

    #[test]
    fn test_tagfile_off_skips_inside_the_step() {
        struct PanickingFetcher;
        impl crate::tagging::MetadataFetcher for PanickingFetcher {
            fn name(&self) -> &str {
                "tmdb"
            }
            fn fetch(
                &self,
                _request: &TaggingInfo,
                _language: &str,
            ) -> Result<TagSet, crate::tagging::TagError> {
                panic!("fetcher must not run when tagfile is off");
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.tagging_info = Some(TaggingInfo {
            id: "603".to_string(),
            id_type: "tmdb_id".to_string(),
            season: None,
            episode: None,
        });

        let mut taggers = TaggerRegistry::default();
        taggers.register_fetcher(Box::new(PanickingFetcher));

        let mut config = Config::default();
        config.tagging.tagfile = false;

        // The transition still fires; only the action is skipped.
        job.tag(&taggers, &config);
        assert_eq!(job.state(), JobState::Tagged);
    }

    #[test]
    fn test_full_guard_chain_without_conversion() {
        // Nothing after a failed conversion may touch the filesystem.
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, false);
        let taggers = TaggerRegistry::default();
        let config = Config::default();

        job.tag(&taggers, &config);
        job.postprocess(&[]);
        job.deploy().unwrap();
        job.delete();
        job.refresh();
        job.finish();

        assert_eq!(job.state(), JobState::Initialised);
        assert!(job.input.exists());
    }

    #[test]
    fn test_finish_from_processed() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_output(&dir, true);
        job.finish();
        assert_eq!(job.state(), JobState::Finished);
    }
}
