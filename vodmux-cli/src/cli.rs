use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "HLS VOD download tool",
    long_about = "Downloads HLS video-on-demand streams into a single file.\n\
                  \n\
                  Resolves master playlists to the highest-bandwidth variant,\n\
                  decrypts AES-128 protected segments, downloads segments in\n\
                  concurrent batches and concatenates them into one output file."
)]
pub struct CliArgs {
    /// Playlist URL to download
    #[arg(required = true, help = "HTTP(S) URL of the .m3u8 playlist")]
    pub url: String,

    /// Output directory for the downloaded file
    #[arg(
        short,
        long,
        help = "Directory where the downloaded file will be saved (default: current directory)"
    )]
    pub output_dir: Option<PathBuf>,

    /// Base name for the output file
    #[arg(
        short = 'n',
        long = "name",
        help = "Base filename for the output (default: derived from the playlist URL); the extension is chosen by the produced container"
    )]
    pub name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Overall timeout in seconds for HTTP requests
    #[arg(
        long,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Number of segments downloaded concurrently per batch
    #[arg(
        long,
        default_value = "5",
        help = "Number of segments downloaded concurrently per batch"
    )]
    pub batch_size: usize,

    /// Segment retry attempts
    #[arg(
        long,
        default_value = "3",
        help = "Number of retry attempts for failed segment downloads"
    )]
    pub retries: u32,

    /// Show a progress bar
    #[arg(
        short = 'P',
        long = "progress",
        default_value = "false",
        help = "Show a progress bar while downloading segments"
    )]
    pub show_progress: bool,
}
