use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediamill")]
#[command(author, version, about = "Media transcoding and post-processing automation")]
pub struct Cli {
    /// Configuration file to use instead of the default locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at trace/debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file and run the post-conversion workflow
    Run {
        /// Input file to process
        #[arg(required = true)]
        input: PathBuf,

        /// Target container (a [containers.<name>] section), e.g. mp4
        #[arg(short, long, default_value = "mp4")]
        target: String,

        /// External metadata id for tagging, e.g. a tmdb or tvdb id
        #[arg(long)]
        id: Option<String>,

        /// Kind of the metadata id (tmdb_id, tvdb_id, imdb_id)
        #[arg(long, requires = "id")]
        id_type: Option<String>,

        /// Season number; presence marks the input as a show episode
        #[arg(long, requires = "id")]
        season: Option<u32>,

        /// Episode number
        #[arg(long, requires = "season")]
        episode: Option<u32>,

        /// Refresher names to notify after deploy (repeatable)
        #[arg(long = "notify")]
        notify: Vec<String>,

        /// Configuration overrides as TOML snippets, merged over the config
        /// file (repeatable), e.g. --override 'file.delete_original = true'
        #[arg(long = "override")]
        overrides: Vec<String>,

        /// Print the transcoder command without executing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output the raw prober JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
