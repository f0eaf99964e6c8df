use crate::audio::audio_duration_seconds;
use crate::error::{ReelError, Result, Stage};
use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

pub const DEFAULT_EDGE_VOICE: &str = "en-US-AriaNeural";
pub const DEFAULT_PIPER_MODEL: &str = "en_US-amy-medium";

const EDGE_VOICES: &[(&str, &str)] = &[
    ("en-US", "en-US-AriaNeural"),
    ("en-GB", "en-GB-SoniaNeural"),
    ("yue-CN", "zh-HK-HiuMaanNeural"),
];

const PIPER_MODELS: &[(&str, &str)] = &[
    ("en-US", "en_US-amy-medium"),
    ("en-GB", "en_GB-alba-medium"),
];

pub fn edge_voice(locale: &str) -> &'static str {
    lookup(EDGE_VOICES, locale).unwrap_or(DEFAULT_EDGE_VOICE)
}

pub fn piper_model(locale: &str) -> &'static str {
    lookup(PIPER_MODELS, locale).unwrap_or(DEFAULT_PIPER_MODEL)
}

fn lookup(table: &'static [(&'static str, &'static str)], locale: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(locale))
        .map(|(_, v)| *v)
}

/// Synthesized narration; its duration is only known after synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationAsset {
    pub path: PathBuf,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SynthesizerKind {
    #[default]
    Edge,
    Piper,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extension of the audio files this engine writes.
    fn extension(&self) -> &'static str;

    async fn synthesize(&self, text: &str, locale: &str, out_path: &Path) -> Result<()>;
}

/// Runs `synth` into `dir` and measures the result.
pub async fn synthesize_narration(
    synth: &dyn SpeechSynthesizer,
    text: &str,
    locale: &str,
    dir: &Path,
) -> Result<NarrationAsset> {
    let path = dir.join(format!("narration.{}", synth.extension()));
    info!("Generating TTS with {} ({} chars)", synth.name(), text.len());
    synth.synthesize(text, locale, &path).await?;

    if !path.exists() {
        return Err(ReelError::provider(
            Stage::Speech,
            format!("{} produced no file at {}", synth.name(), path.display()),
        ));
    }
    let duration = audio_duration_seconds(&path)
        .await
        .map_err(|e| ReelError::provider(Stage::Speech, format!("{:#}", e)))?;
    info!("Narration duration: {:.2} seconds", duration);
    Ok(NarrationAsset { path, duration })
}

/// Microsoft Edge neural voices through the `edge-tts` command.
pub struct EdgeTtsSynthesizer {
    program: String,
}

impl EdgeTtsSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        EdgeTtsSynthesizer {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    fn name(&self) -> &'static str {
        "edge-tts"
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, locale: &str, out_path: &Path) -> Result<()> {
        let voice = edge_voice(locale);
        info!("Calling edge-tts with voice {}", voice);
        let output = Command::new(&self.program)
            .arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(out_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ReelError::provider(Stage::Speech, format!("cannot run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            error!("edge-tts failed for {}", out_path.display());
            return Err(ReelError::provider(
                Stage::Speech,
                format!(
                    "edge-tts exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

/// Local Piper voices; text goes in on stdin.
pub struct PiperSynthesizer {
    program: String,
    models_dir: PathBuf,
}

impl PiperSynthesizer {
    pub fn new(program: impl Into<String>, models_dir: impl Into<PathBuf>) -> Self {
        PiperSynthesizer {
            program: program.into(),
            models_dir: models_dir.into(),
        }
    }

    pub fn model_path(&self, locale: &str) -> PathBuf {
        self.models_dir.join(format!("{}.onnx", piper_model(locale)))
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperSynthesizer {
    fn name(&self) -> &'static str {
        "piper"
    }

    fn extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize(&self, text: &str, locale: &str, out_path: &Path) -> Result<()> {
        let model = self.model_path(locale);
        info!("Calling Piper TTS with model {}", model.display());

        let mut child = Command::new(&self.program)
            .arg("--model")
            .arg(&model)
            .arg("--output_file")
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ReelError::provider(Stage::Speech, format!("cannot run {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| ReelError::provider(Stage::Speech, e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ReelError::provider(Stage::Speech, e))?;
        if !output.status.success() {
            error!("Piper TTS command failed for {}", out_path.display());
            return Err(ReelError::provider(
                Stage::Speech,
                format!(
                    "piper exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentWav {
        seconds: u32,
    }

    #[async_trait]
    impl SpeechSynthesizer for SilentWav {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn extension(&self) -> &'static str {
            "wav"
        }

        async fn synthesize(&self, _text: &str, _locale: &str, out_path: &Path) -> Result<()> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 8000,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(out_path, spec).unwrap();
            for _ in 0..(8000 * self.seconds) {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
            Ok(())
        }
    }

    struct NoOutput;

    #[async_trait]
    impl SpeechSynthesizer for NoOutput {
        fn name(&self) -> &'static str {
            "mute"
        }

        fn extension(&self) -> &'static str {
            "wav"
        }

        async fn synthesize(&self, _: &str, _: &str, _: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn known_locales_resolve_to_their_voice() {
        assert_eq!(edge_voice("en-GB"), "en-GB-SoniaNeural");
        assert_eq!(edge_voice("yue-cn"), "zh-HK-HiuMaanNeural");
        assert_eq!(piper_model("en-GB"), "en_GB-alba-medium");
    }

    #[test]
    fn unknown_locale_falls_back_to_default_voice() {
        assert_eq!(edge_voice("fr-FR"), DEFAULT_EDGE_VOICE);
        assert_eq!(piper_model("yue-CN"), DEFAULT_PIPER_MODEL);
    }

    #[test]
    fn piper_model_path_joins_models_dir() {
        let piper = PiperSynthesizer::new("piper", "/opt/voices");
        assert_eq!(
            piper.model_path("en-US"),
            PathBuf::from("/opt/voices/en_US-amy-medium.onnx")
        );
    }

    #[tokio::test]
    async fn narration_duration_is_measured_after_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let asset = synthesize_narration(&SilentWav { seconds: 2 }, "hello", "en-US", dir.path())
            .await
            .unwrap();
        assert_eq!(asset.path, dir.path().join("narration.wav"));
        assert!((asset.duration - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_output_is_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = synthesize_narration(&NoOutput, "hello", "en-US", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Provider { stage: Stage::Speech, .. }));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        // a zombie has already been killed and only awaits reaping
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| {
                let state = stat.rsplit(')').next().unwrap_or("").trim_start();
                !state.starts_with('Z')
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timed_out_synthesis_kills_the_engine() {
        use crate::error::with_timeout;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("engine.pid");
        let script = dir.path().join("slow-edge-tts");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 20\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let synth = EdgeTtsSynthesizer::new(script.to_string_lossy());
        let out = dir.path().join("narration.mp3");
        let err = with_timeout(
            Stage::Speech,
            Duration::from_millis(500),
            synth.synthesize("hello", "en-US", &out),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReelError::Provider { stage: Stage::Speech, .. }));

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!is_running(pid), "edge-tts process {} outlived its timeout", pid);
    }

    #[tokio::test]
    async fn undecodable_narration_is_speech_error() {
        struct Garbage;

        #[async_trait]
        impl SpeechSynthesizer for Garbage {
            fn name(&self) -> &'static str {
                "garbage"
            }

            fn extension(&self) -> &'static str {
                "mp3"
            }

            async fn synthesize(&self, _: &str, _: &str, out_path: &Path) -> Result<()> {
                std::fs::write(out_path, b"not audio at all").unwrap();
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let err = synthesize_narration(&Garbage, "hello", "en-US", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Provider { stage: Stage::Speech, .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let synth = EdgeTtsSynthesizer::new("definitely-not-an-edge-tts-binary");
        let err = synth
            .synthesize("hi", "en-US", &dir.path().join("x.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::Provider { stage: Stage::Speech, .. }));
    }
}
