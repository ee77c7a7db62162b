//! Post-processors run against the converted file before deploy.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait PostProcessor: Send + Sync {
    /// Name the container configuration refers to.
    fn name(&self) -> &str;

    fn process(&self, file: &Path) -> Result<()>;
}

/// Resolve configured post-processor names to implementations. Unknown names
/// are dropped with a warning.
pub fn resolve(names: &[String], ffmpeg: &Path) -> Vec<Box<dyn PostProcessor>> {
    let mut out: Vec<Box<dyn PostProcessor>> = Vec::new();
    for name in names {
        match name.to_lowercase().as_str() {
            "faststart" => out.push(Box::new(Faststart {
                ffmpeg: ffmpeg.to_path_buf(),
            })),
            other => tracing::warn!("no post-processor named {other:?}"),
        }
    }
    out
}

/// Rewrites an MP4 with the moov atom up front so playback can start before
/// the download finishes.
pub struct Faststart {
    ffmpeg: PathBuf,
}

impl PostProcessor for Faststart {
    fn name(&self) -> &str {
        "faststart"
    }

    fn process(&self, file: &Path) -> Result<()> {
        let temp_output = file.with_extension("faststart.mp4");

        let result = Command::new(&self.ffmpeg)
            .args(["-y", "-i"])
            .arg(file)
            .args(["-c", "copy", "-movflags", "+faststart"])
            .arg(&temp_output)
            .output();

        match result {
            Ok(output) if output.status.success() => {
                std::fs::rename(&temp_output, file)?;
                tracing::debug!("applied faststart to {}", file.display());
                Ok(())
            }
            Ok(output) => {
                let _ = std::fs::remove_file(&temp_output);
                anyhow::bail!(
                    "ffmpeg faststart pass exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_output);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_and_unknown() {
        let processors = resolve(
            &["faststart".to_string(), "nonexistent".to_string()],
            Path::new("ffmpeg"),
        );
        assert_eq!(processors.len(), 1);
        assert_eq!(processors[0].name(), "faststart");
    }
}
