use crate::timeline::Overlay;
use crate::utils::wrap_text;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const SRT_LINE_WIDTH: usize = 42;

pub fn write_srt<'a>(path: &Path, captions: impl IntoIterator<Item = &'a Overlay>) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (i, caption) in captions.into_iter().enumerate() {
        writeln!(f, "{}", i + 1)?;
        writeln!(
            f,
            "{} --> {}",
            format_srt_time(caption.start),
            format_srt_time(caption.end())
        )?;
        for line in wrap_text(&caption.text, SRT_LINE_WIDTH) {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)?;
    }
    f.flush()
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
fn format_srt_time(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1000 % 60,
        ms % 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{ReelSettings, caption_overlays};

    #[test]
    fn formats_srt_timestamps() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3.0016), "00:00:03,002");
        assert_eq!(format_srt_time(3725.25), "01:02:05,250");
    }

    #[test]
    fn writes_numbered_cues() {
        let captions = caption_overlays("One. Two. Three.", 9.0, &ReelSettings::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.srt");
        write_srt(&path, &captions).unwrap();

        let srt = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:03,000 --> 00:00:05,000\nOne.\n\n\
             2\n00:00:05,000 --> 00:00:07,000\nTwo.\n\n\
             3\n00:00:07,000 --> 00:00:09,000\nThree.\n\n"
        );
    }
}
