use crate::catalog::DayOrdinal;
use crate::narration::{GEMINI_BASE_URL, GEMINI_MODEL, NarratorKind};
use crate::tts::SynthesizerKind;
use crate::footage::PEXELS_BASE_URL;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "dailyreel")]
#[command(about = "Render today's short vertical video reel", long_about = None)]
pub struct Args {
    /// Gemini API key used for narration
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Pexels API key used for stock footage search
    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_api_key: Option<String>,

    /// JSON topic catalog; the built-in Salford catalog when omitted
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = DayOrdinal::Month)]
    pub day_ordinal: DayOrdinal,

    #[arg(long, value_enum, default_value_t = NarratorKind::Gemini)]
    pub narrator: NarratorKind,

    #[arg(long, value_enum, default_value_t = SynthesizerKind::Edge)]
    pub synthesizer: SynthesizerKind,

    #[arg(long, default_value = "en-US")]
    pub locale: String,

    #[arg(long, default_value = "edge-tts")]
    pub edge_tts_bin: String,

    #[arg(long, default_value = "piper")]
    pub piper_bin: String,

    /// Directory holding Piper .onnx voice models
    #[arg(long, default_value = "./tts")]
    pub piper_models: PathBuf,

    #[arg(long, default_value = "videos/reels")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "reel")]
    pub prefix: String,

    #[arg(long, default_value_t = 80)]
    pub max_words: usize,

    /// Longest reel in seconds; never cuts narration short
    #[arg(long, default_value_t = 30.0)]
    pub max_duration: f64,

    /// Title card window before captions start
    #[arg(long, default_value_t = 3.0)]
    pub lead_in: f64,

    /// Hashtag card window at the end
    #[arg(long, default_value_t = 2.0)]
    pub trailing: f64,

    #[arg(long, default_value_t = 1080)]
    pub width: u32,

    #[arg(long, default_value_t = 1920)]
    pub height: u32,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Font file for overlays; fontconfig's Sans when omitted
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Also write the caption track as an .srt next to the video
    #[arg(long)]
    pub srt: bool,

    /// Print the composition as JSON instead of rendering
    #[arg(long)]
    pub plan_only: bool,

    /// Timeout for narration, speech and search calls
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 300)]
    pub download_timeout_secs: u64,

    #[arg(long, default_value = GEMINI_MODEL)]
    pub gemini_model: String,

    #[arg(long, default_value = GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    #[arg(long, default_value = PEXELS_BASE_URL)]
    pub pexels_base_url: String,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}
