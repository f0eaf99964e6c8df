use crate::footage::BackgroundAsset;
use anyhow::{Context, Result};
use hound::WavReader;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to read WAV header of {}", path.display()))?;
    let rate = reader.spec().sample_rate;
    anyhow::ensure!(rate > 0, "WAV {} declares a zero sample rate", path.display());
    // `duration` counts frames, so channels are already folded in
    Ok(f64::from(reader.duration()) / f64::from(rate))
}

/// Duration of any audio file: WAV from its header, everything else via ffprobe.
pub async fn audio_duration_seconds(path: &Path) -> Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return wav_duration_seconds(path);
    }
    let probe = run_ffprobe(path).await?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .with_context(|| format!("ffprobe reported no duration for {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

pub async fn probe_video(path: &Path) -> Result<BackgroundAsset> {
    let probe = run_ffprobe(path).await?;
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .with_context(|| format!("No video stream in {}", path.display()))?;
    let (width, height) = stream
        .width
        .zip(stream.height)
        .filter(|(w, h)| *w > 0 && *h > 0)
        .with_context(|| format!("ffprobe returned no dimensions for {}", path.display()))?;
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .with_context(|| format!("ffprobe returned no duration for {}", path.display()))?;

    Ok(BackgroundAsset {
        path: path.to_path_buf(),
        duration,
        width,
        height,
    })
}

async fn run_ffprobe(path: &Path) -> Result<FfprobeOutput> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe JSON output")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as u32 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_duration_accounts_for_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 16000, 24000);
        let d = wav_duration_seconds(&path).unwrap();
        assert!((d - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn audio_duration_uses_wav_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.WAV");
        write_wav(&path, 1, 22050, 22050 * 3);
        let d = audio_duration_seconds(&path).await.unwrap();
        assert!((d - 3.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_wav_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a wav").unwrap();
        assert!(wav_duration_seconds(&path).is_err());
    }

    #[test]
    fn parses_ffprobe_json() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let out: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(out.streams[1].width, Some(1920));
        assert_eq!(out.format.duration.as_deref(), Some("12.480000"));
    }
}
