mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mediamill::config;
use mediamill::tagging::{TaggerRegistry, TaggingInfo};
use mediamill::{Conversion, Job};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the --verbose flag when both are present.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediamill=trace,mediamill_convert=debug".to_string()
        } else {
            "mediamill=info,mediamill_convert=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .init();

    match cli.command {
        Commands::Run {
            input,
            target,
            id,
            id_type,
            season,
            episode,
            notify,
            overrides,
            dry_run,
        } => {
            let tagging_info = id.map(|id| TaggingInfo {
                id_type: id_type.unwrap_or_else(|| "tmdb_id".to_string()),
                id,
                season,
                episode,
            });
            run_job(
                &input,
                &target,
                cli.config.as_deref(),
                &overrides,
                tagging_info,
                &notify,
                dry_run,
            )
        }
        Commands::Probe { file, json } => probe_file(&file, cli.config.as_deref(), json),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediamill {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn run_job(
    input: &Path,
    target: &str,
    config_path: Option<&Path>,
    overrides: &[String],
    tagging_info: Option<TaggingInfo>,
    notify: &[String],
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config_with_overrides(config_path, overrides)?;

    tracing::info!("Processing file: {}", input.display());

    let conversion = Conversion::from_config(&config, target)?;
    let mut job = Job::new(input, target, &config, tagging_info, notify)?;

    if dry_run {
        let argv = conversion.plan_command(input, job.work_file())?;
        println!("{}", argv.join(" "));
        return Ok(());
    }

    let policy = &config.containers[target];
    let processors =
        mediamill::postprocess::resolve(&policy.post_processors, &config.ffmpeg.ffmpeg);

    // Collaborator registries are empty by default; deployments wire their
    // fetchers and writers in here.
    let taggers = TaggerRegistry::default();

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("cancellation requested, stopping transcoder");
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }) {
            tracing::debug!("could not install interrupt handler: {e}");
        }
    }

    job.run(&conversion, &taggers, &processors, &config, &cancel)?;
    match job.final_file() {
        Some(path) => tracing::info!("job finished, output at {}", path.display()),
        None => tracing::info!("job finished in state {:?}", job.state()),
    }
    Ok(())
}

fn probe_file(
    file: &Path,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config_or_default(config_path)?;

    if json {
        let raw = mediamill_convert::probe::probe_json(&config.ffmpeg.ffprobe, file)?;
        println!("{raw}");
        return Ok(());
    }

    let container = mediamill_convert::probe(&config.ffmpeg.ffprobe, file)?;
    println!("File: {}", container.path().display());
    println!("Container: {}", container.format());
    for (index, stream) in container.streams().iter().enumerate() {
        let mut details = Vec::new();
        if let Some(lang) = stream.language() {
            details.push(lang.to_string());
        }
        if let Some(channels) = stream.channels() {
            details.push(format!("{channels}ch"));
        }
        if let Some(bitrate) = stream.bitrate().filter(|b| *b > 0) {
            details.push(format!("{bitrate} kb/s"));
        }
        println!(
            "  #{index} {}: {} {}",
            stream.kind(),
            stream.format().name,
            details.join(" ")
        );
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config_or_default(config_path)?;

    for tool in [&config.ffmpeg.ffmpeg, &config.ffmpeg.ffprobe] {
        match which::which(tool) {
            Ok(path) => println!("{}: {}", tool.display(), path.display()),
            Err(_) => println!("{}: NOT FOUND", tool.display()),
        }
    }

    match mediamill_convert::Capabilities::detect(&config.ffmpeg.ffmpeg) {
        Ok(caps) => println!("encoders available: {}", caps.encoder_count()),
        Err(e) => println!("could not probe encoder capabilities: {e}"),
    }
    Ok(())
}

fn validate_config(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match config::load_config_or_default(config_path) {
        Ok(config) => {
            println!("configuration OK");
            println!("  containers: {:?}", config.containers.keys().collect::<Vec<_>>());
            println!("  audio languages: {:?}", config.languages.audio);
            println!("  subtitle languages: {:?}", config.languages.subtitle);
            Ok(())
        }
        Err(e) => {
            eprintln!("configuration invalid: {e:#}");
            std::process::exit(1);
        }
    }
}
