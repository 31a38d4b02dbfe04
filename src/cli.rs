use clap::Parser;

/// Convert lossless audio files and cue-sheet albums to MP3 via ffmpeg.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Input: a .cue file, a lossless audio file, or a directory to walk
    pub input: String,

    /// Output directory (defaults to the current directory)
    pub outdir: Option<String>,

    /// Output bitrate (e.g. 192k)
    #[arg(short = 'b', long)]
    pub bitrate: Option<String>,

    /// Write outputs next to their inputs instead of into OUTDIR
    #[arg(short = 's', long)]
    pub samedir: bool,

    /// Number of parallel transcodes. Without a value, one per CPU core.
    #[arg(short = 'j', long, num_args = 0..=1, default_missing_value = "0", value_name = "N")]
    pub jobs: Option<usize>,

    /// Include the artist in output filenames (NN - Artist - Title.mp3)
    #[arg(long = "artist-in-filename")]
    pub artist_in_filename: bool,

    /// Path to a JSON file overriding encoding options (ffmpeg path,
    /// recognized extensions, bitrate limits)
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config: Option<String>,

    /// Automatically confirm the conversion plan and proceed without prompting
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Show ffmpeg logs.
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Check ffmpeg installation and exit
    #[arg(short = 'c', long)]
    pub check_ffmpeg: bool,
}
