//! Timeline composition for a single reel.
//!
//! Everything here is pure arithmetic over the story text, the measured
//! narration length and the background clip's native geometry. The result is
//! a [`Composition`] that fully describes what the renderer has to draw, with
//! every time expressed in seconds from the start of the reel.
//!
//! Screen layout, top to bottom: the title card sits mid-frame, captions sit
//! in the lower safe area and the hashtag card in a band below them. The
//! hashtag window may overlap the last caption in time; they never share a
//! band, so both are drawn.

use crate::footage::BackgroundAsset;
use crate::narration::Story;
use crate::tts::NarrationAsset;
use crate::utils::split_sentences;
use serde::Serialize;
use std::path::PathBuf;

const EPSILON: f64 = 1e-9;

/// Reference frame the layout constants are tuned for.
const REFERENCE_WIDTH: f64 = 1080.0;
const REFERENCE_HEIGHT: f64 = 1920.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("0x{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReelSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub lead_in: f64,
    pub trailing: f64,
    pub max_duration: f64,
    pub title_fade: f64,
    pub caption_fade: f64,
    pub hashtag_fade: f64,
    pub placeholder: Rgb,
}

impl Default for ReelSettings {
    fn default() -> Self {
        ReelSettings {
            width: 1080,
            height: 1920,
            fps: 30,
            lead_in: 3.0,
            trailing: 2.0,
            max_duration: 30.0,
            title_fade: 0.5,
            caption_fade: 0.3,
            hashtag_fade: 0.3,
            placeholder: Rgb(30, 30, 30),
        }
    }
}

impl ReelSettings {
    fn scale_x(&self, v: f64) -> u32 {
        (v * self.width as f64 / REFERENCE_WIDTH).round() as u32
    }

    fn scale_y(&self, v: f64) -> u32 {
        (v * self.height as f64 / REFERENCE_HEIGHT).round() as u32
    }

    fn style(&self, kind: OverlayKind) -> TextStyle {
        let column_width = self.scale_x(900.0);
        match kind {
            OverlayKind::Title => TextStyle {
                font_size: self.scale_y(70.0),
                color: "white",
                position: Position::Center,
                column_width,
            },
            OverlayKind::Caption => TextStyle {
                font_size: self.scale_y(50.0),
                color: "white",
                position: Position::Top(self.scale_y(1600.0)),
                column_width,
            },
            OverlayKind::Hashtags => TextStyle {
                font_size: self.scale_y(35.0),
                color: "lightblue",
                position: Position::Top(self.scale_y(1700.0)),
                column_width,
            },
        }
    }
}

/// Length of the reel for a narration of `narration` seconds.
///
/// Nominally `min(narration + lead_in, max_duration)`. The narration track
/// starts at zero and is never trimmed, so a binding cap is raised back up to
/// the narration length.
pub fn target_duration(narration: f64, settings: &ReelSettings) -> f64 {
    let narration = if narration.is_finite() { narration.max(0.0) } else { 0.0 };
    let nominal = (narration + settings.lead_in).min(settings.max_duration);
    nominal.max(narration)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundTrack {
    /// Stock clip scaled to frame height, center-cropped or padded to frame
    /// width, repeated `loops` times and cut at `duration`.
    Clip {
        source: PathBuf,
        scaled_width: u32,
        scaled_height: u32,
        crop_x: u32,
        pad_x: u32,
        loops: u32,
        duration: f64,
    },
    Solid {
        color: Rgb,
        width: u32,
        height: u32,
        duration: f64,
    },
}

impl BackgroundTrack {
    pub fn duration(&self) -> f64 {
        match self {
            BackgroundTrack::Clip { duration, .. } | BackgroundTrack::Solid { duration, .. } => {
                *duration
            }
        }
    }
}

/// Whole-clip repetitions needed so `clip` seconds cover `target`.
pub fn loop_count(clip: f64, target: f64) -> u32 {
    if clip <= EPSILON || clip >= target {
        return 1;
    }
    (target / clip).floor() as u32 + 1
}

pub fn fit_background(
    asset: Option<&BackgroundAsset>,
    target: f64,
    settings: &ReelSettings,
) -> BackgroundTrack {
    let Some(asset) = asset.filter(|a| a.width > 0 && a.height > 0 && a.duration > 0.0) else {
        return BackgroundTrack::Solid {
            color: settings.placeholder,
            width: settings.width,
            height: settings.height,
            duration: target,
        };
    };

    let scaled_height = settings.height;
    let raw_width = asset.width as f64 * settings.height as f64 / asset.height as f64;
    // libx264 wants even dimensions
    let scaled_width = ((raw_width / 2.0).round() as u32 * 2).max(2);
    let (crop_x, pad_x) = if scaled_width > settings.width {
        ((scaled_width - settings.width) / 2, 0)
    } else {
        (0, (settings.width - scaled_width) / 2)
    };

    BackgroundTrack::Clip {
        source: asset.path.clone(),
        scaled_width,
        scaled_height,
        crop_x,
        pad_x,
        loops: loop_count(asset.duration, target),
        duration: target,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Title,
    Caption,
    Hashtags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Center,
    /// Top edge of the text block, in pixels from the top of the frame.
    Top(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font_size: u32,
    pub color: &'static str,
    pub position: Position,
    pub column_width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub style: TextStyle,
}

impl Overlay {
    fn new(
        kind: OverlayKind,
        text: String,
        start: f64,
        duration: f64,
        fade: f64,
        settings: &ReelSettings,
    ) -> Self {
        // Fades stay inside the window and never cross each other.
        let fade = fade.clamp(0.0, duration / 2.0);
        Overlay {
            kind,
            text,
            start,
            duration,
            fade_in: fade,
            fade_out: fade,
            style: settings.style(kind),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Equal slices of `[lead_in, target]`, one per sentence. The last slice
/// ends exactly at `target`.
pub fn caption_overlays(narration: &str, target: f64, settings: &ReelSettings) -> Vec<Overlay> {
    let sentences = split_sentences(narration);
    let window = target - settings.lead_in;
    if sentences.is_empty() || window <= EPSILON {
        return Vec::new();
    }

    let count = sentences.len();
    let slice = window / count as f64;
    sentences
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let start = settings.lead_in + i as f64 * slice;
            let duration = if i + 1 == count {
                target - start
            } else {
                slice.min(target - start)
            };
            Overlay::new(
                OverlayKind::Caption,
                text,
                start,
                duration,
                settings.caption_fade,
                settings,
            )
        })
        .collect()
}

pub fn title_overlay(title: &str, target: f64, settings: &ReelSettings) -> Option<Overlay> {
    let duration = settings.lead_in.min(target);
    if title.trim().is_empty() || duration <= EPSILON {
        return None;
    }
    Some(Overlay::new(
        OverlayKind::Title,
        title.trim().to_string(),
        0.0,
        duration,
        settings.title_fade,
        settings,
    ))
}

pub fn hashtag_overlay(hashtags: &[String], target: f64, settings: &ReelSettings) -> Option<Overlay> {
    let text = hashtags.join(" ");
    let start = (target - settings.trailing).max(0.0);
    let duration = target - start;
    if text.trim().is_empty() || duration <= EPSILON {
        return None;
    }
    Some(Overlay::new(
        OverlayKind::Hashtags,
        text,
        start,
        duration,
        settings.hashtag_fade,
        settings,
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    pub source: PathBuf,
    pub offset: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub background: BackgroundTrack,
    pub audio: AudioTrack,
    pub overlays: Vec<Overlay>,
}

impl Composition {
    pub fn captions(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays
            .iter()
            .filter(|o| o.kind == OverlayKind::Caption)
    }
}

pub fn compose(
    story: &Story,
    narration: &NarrationAsset,
    background: Option<&BackgroundAsset>,
    settings: &ReelSettings,
) -> Composition {
    let duration = target_duration(narration.duration, settings);

    let mut overlays = Vec::new();
    overlays.extend(title_overlay(&story.title, duration, settings));
    overlays.extend(caption_overlays(&story.narration, duration, settings));
    overlays.extend(hashtag_overlay(&story.hashtags, duration, settings));

    Composition {
        duration,
        width: settings.width,
        height: settings.height,
        fps: settings.fps,
        background: fit_background(background, duration, settings),
        audio: AudioTrack {
            source: narration.path.clone(),
            offset: 0.0,
            duration: narration.duration,
        },
        overlays,
    }
}
