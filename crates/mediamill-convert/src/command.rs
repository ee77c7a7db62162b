//! Command synthesizer: turns a plan into the transcoder's argv.
//!
//! Emission order is fixed and observable: input, preopts, then one
//! `-map 0:<src>` plus rendered encoder options per mapping pair in target
//! order, then the output format, postopts, and destination. Equal inputs
//! always produce identical argv.

use crate::container::Container;
use crate::encoders::EncoderSelector;
use crate::error::{Error, Result};
use crate::options::OptionKind;
use crate::plan::Plan;
use std::path::Path;

/// Synthesize the full transcoder argv for a plan.
pub fn synthesize(
    ffmpeg: &Path,
    source: &Container,
    plan: &Plan,
    selector: &EncoderSelector<'_>,
    preopts: &[String],
    postopts: &[String],
) -> Result<Vec<String>> {
    let mut argv = vec![
        ffmpeg.display().to_string(),
        "-i".to_string(),
        source.path().display().to_string(),
    ];
    argv.extend(preopts.iter().cloned());

    for (source_index, target_index) in &plan.mapping {
        let source_stream = source
            .stream(*source_index)
            .ok_or_else(|| Error::plan(format!("mapping names missing source {source_index}")))?;
        let target_stream = plan
            .target
            .stream(*target_index)
            .ok_or_else(|| Error::plan(format!("mapping names missing target {target_index}")))?;
        let relative = plan
            .target
            .relative_index(target_stream.uid())
            .ok_or_else(|| Error::plan(format!("no relative index for target {target_index}")))?;

        argv.push("-map".to_string());
        argv.push(format!("0:{source_index}"));

        let mut encoder = selector.select(source_stream, target_stream)?;
        if encoder.is_copy() {
            // A copied stream keeps its content; only mux-time metadata and
            // the language tag are re-stated.
            for opt in target_stream.options().metadata_options().iter() {
                encoder.add_option(opt.clone());
            }
            if let Some(lang) = target_stream.options().get(OptionKind::Language) {
                encoder.add_option(lang.clone());
            }
        } else {
            for opt in target_stream.options() {
                encoder.add_option(opt.clone());
            }
        }

        argv.extend(encoder.render(target_stream.kind(), relative));
    }

    argv.push("-f".to_string());
    argv.push(plan.target.format().ffmpeg_name().to_string());
    argv.extend(postopts.iter().cloned());
    argv.push("-y".to_string());
    argv.push(plan.target.path().display().to_string());

    Ok(argv)
}
