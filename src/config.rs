use crate::args::Args;
use crate::error::{ReelError, Result};
use crate::timeline::ReelSettings;
use std::time::Duration;

/// API keys checked before anything touches the network.
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub pexels_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"<redacted>")
            .field("pexels_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_args(args: &Args) -> Result<Self> {
        let gemini_api_key = required(&args.gemini_api_key, "GEMINI_API_KEY")?;
        let pexels_api_key = required(&args.pexels_api_key, "PEXELS_API_KEY")?;
        Ok(Credentials {
            gemini_api_key,
            pexels_api_key,
        })
    }
}

fn required(value: &Option<String>, env_var: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ReelError::config(format!(
                "{} not found; set it in the environment or pass --{}",
                env_var,
                env_var.to_lowercase().replace('_', "-")
            ))
        })
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Narration, speech and search calls.
    pub call: Duration,
    pub download: Duration,
}

impl Timeouts {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.timeout_secs == 0 || args.download_timeout_secs == 0 {
            return Err(ReelError::config("timeouts must be at least one second"));
        }
        Ok(Timeouts {
            call: Duration::from_secs(args.timeout_secs),
            download: Duration::from_secs(args.download_timeout_secs),
        })
    }
}

pub fn reel_settings(args: &Args) -> Result<ReelSettings> {
    if args.width == 0 || args.height == 0 || args.width % 2 == 1 || args.height % 2 == 1 {
        return Err(ReelError::config(format!(
            "frame size {}x{} must be positive and even",
            args.width, args.height
        )));
    }
    if args.fps == 0 {
        return Err(ReelError::config("fps must be positive"));
    }
    let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
    if !finite_non_negative(args.lead_in) || !finite_non_negative(args.trailing) {
        return Err(ReelError::config("lead-in and trailing must be non-negative"));
    }
    if !args.max_duration.is_finite() || args.max_duration <= 0.0 {
        return Err(ReelError::config("max-duration must be positive"));
    }
    if args.max_words == 0 {
        return Err(ReelError::config("max-words must be positive"));
    }

    Ok(ReelSettings {
        width: args.width,
        height: args.height,
        fps: args.fps,
        lead_in: args.lead_in,
        trailing: args.trailing,
        max_duration: args.max_duration,
        ..ReelSettings::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["dailyreel"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn both_keys_are_required() {
        let mut a = args(&[]);
        a.gemini_api_key = Some("g".into());
        a.pexels_api_key = None;
        let err = Credentials::from_args(&a).unwrap_err();
        assert!(matches!(err, ReelError::Config(_)));
        assert!(err.to_string().contains("PEXELS_API_KEY"));

        a.gemini_api_key = Some("   ".into());
        a.pexels_api_key = Some("p".into());
        let err = Credentials::from_args(&a).unwrap_err();
        assert!(err.to_string().contains("--gemini-api-key"));
    }

    #[test]
    fn keys_are_trimmed_and_redacted() {
        let mut a = args(&[]);
        a.gemini_api_key = Some(" g-key ".into());
        a.pexels_api_key = Some("p-key".into());
        let creds = Credentials::from_args(&a).unwrap();
        assert_eq!(creds.gemini_api_key, "g-key");
        assert!(!format!("{:?}", creds).contains("p-key"));
    }

    #[test]
    fn settings_follow_args() {
        let s = reel_settings(&args(&["--lead-in", "4", "--max-duration", "45"])).unwrap();
        assert_eq!(s.lead_in, 4.0);
        assert_eq!(s.max_duration, 45.0);
        assert_eq!(s.title_fade, 0.5);
    }

    #[test]
    fn odd_frame_size_is_rejected() {
        assert!(reel_settings(&args(&["--width", "1081"])).is_err());
        assert!(reel_settings(&args(&["--max-duration", "0"])).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Timeouts::from_args(&args(&["--timeout-secs", "0"])).is_err());
        let t = Timeouts::from_args(&args(&[])).unwrap();
        assert_eq!(t.call, Duration::from_secs(60));
        assert_eq!(t.download, Duration::from_secs(300));
    }
}
