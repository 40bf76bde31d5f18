use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "beatcut", about = "Beat-synced slideshow planner for images and music")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// JSON array of per-image attributes (dynamism, motionSuggestion, mood, path)
    #[arg(short, long)]
    pub images: Option<PathBuf>,

    /// Number of images to plan for when no attributes file is given
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// External switch-point suggestions: a JSON file or an http(s) URL
    #[arg(long)]
    pub candidates: Option<String>,

    /// Start of the audio selection in seconds
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// End of the audio selection in seconds (defaults to the end of the track)
    #[arg(long)]
    pub end: Option<f64>,

    /// Output path for the editing plan JSON
    #[arg(short, long, default_value = "plan.json")]
    pub output: PathBuf,

    /// Also write the audio analysis JSON here
    #[arg(long)]
    pub analysis_out: Option<PathBuf>,

    /// Overall mood (calm, upbeat, ...). Derived from audio energy when unset.
    #[arg(long)]
    pub mood: Option<String>,

    /// Title stored in the plan
    #[arg(long)]
    pub title: Option<String>,

    /// Render the plan to a video file with ffmpeg
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// Config file (defaults to beatcut.toml or ~/.config/beatcut/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
