use crate::error::{ReelError, Result};
use crate::timeline::{BackgroundTrack, Composition, Overlay, Position};
use crate::utils::wrap_text;
use anyhow::anyhow;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Rough average glyph width relative to font size for bold sans faces.
const GLYPH_WIDTH_RATIO: f64 = 0.55;
const STROKE_WIDTH: u32 = 2;

pub struct FfmpegRenderer {
    program: String,
    font: Option<PathBuf>,
}

impl FfmpegRenderer {
    pub fn new(program: impl Into<String>, font: Option<PathBuf>) -> Self {
        FfmpegRenderer {
            program: program.into(),
            font,
        }
    }

    /// Encodes `comp` to `output`. Text files for the overlays go to
    /// `work_dir`. The file at `output` only appears once ffmpeg succeeded.
    pub async fn render(&self, comp: &Composition, work_dir: &Path, output: &Path) -> Result<()> {
        let text_files = write_overlay_texts(comp, work_dir)?;
        let partial = partial_path(output);
        let args = build_args(comp, &text_files, self.font.as_deref(), &partial);
        debug!("{} {}", self.program, args.join(" "));

        info!(
            "Rendering {:.1}s reel with {} overlays to {}",
            comp.duration,
            comp.overlays.len(),
            output.display()
        );
        let result = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await;

        let output_status = match result {
            Ok(out) => out,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(ReelError::Render(anyhow!("cannot run {}: {}", self.program, e)));
            }
        };

        if !output_status.status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            error!("ffmpeg failed to produce final video");
            return Err(ReelError::Render(anyhow!(
                "ffmpeg exited with {}: {}",
                output_status.status,
                tail(&stderr, 20)
            )));
        }

        tokio::fs::rename(&partial, output).await?;
        info!("Final video written to {}", output.display());
        Ok(())
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reel.mp4".to_string());
    output.with_file_name(format!(".partial-{}", name))
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Characters per line that fit the overlay's column.
pub fn line_width(overlay: &Overlay) -> usize {
    let glyph = overlay.style.font_size as f64 * GLYPH_WIDTH_RATIO;
    ((overlay.style.column_width as f64 / glyph).floor() as usize).max(8)
}

fn write_overlay_texts(comp: &Composition, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    comp.overlays
        .iter()
        .enumerate()
        .map(|(i, overlay)| {
            let path = dir.join(format!("overlay_{:03}.txt", i));
            let lines = wrap_text(&overlay.text, line_width(overlay));
            std::fs::write(&path, lines.join("\n"))?;
            Ok(path)
        })
        .collect()
}

/// Escapes a value for use inside a filter option.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | ':' | ',' | ';' | '[' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn background_chain(comp: &Composition) -> String {
    match &comp.background {
        BackgroundTrack::Clip {
            scaled_width,
            scaled_height,
            crop_x,
            pad_x,
            duration,
            ..
        } => {
            let mut chain = format!("[0:v]scale={}:{},setsar=1", scaled_width, scaled_height);
            if *scaled_width > comp.width {
                chain.push_str(&format!(",crop={}:{}:{}:0", comp.width, comp.height, crop_x));
            } else if *scaled_width < comp.width {
                chain.push_str(&format!(
                    ",pad={}:{}:{}:0:color=black",
                    comp.width, comp.height, pad_x
                ));
            }
            chain.push_str(&format!(
                ",trim=duration={:.3},setpts=PTS-STARTPTS,fps={}",
                duration, comp.fps
            ));
            chain
        }
        BackgroundTrack::Solid { .. } => format!("[0:v]setsar=1,fps={}", comp.fps),
    }
}

fn alpha_expr(overlay: &Overlay) -> Option<String> {
    if overlay.fade_in <= 0.0 && overlay.fade_out <= 0.0 {
        return None;
    }
    let (s, e) = (overlay.start, overlay.end());
    let rise = if overlay.fade_in > 0.0 {
        format!("if(lt(t,{:.3}),(t-{:.3})/{:.3},", s + overlay.fade_in, s, overlay.fade_in)
    } else {
        "if(0,0,".to_string()
    };
    let fall = if overlay.fade_out > 0.0 {
        format!("if(gt(t,{:.3}),({:.3}-t)/{:.3},1)", e - overlay.fade_out, e, overlay.fade_out)
    } else {
        "1".to_string()
    };
    Some(format!("{}{})", rise, fall))
}

fn drawtext(overlay: &Overlay, text_file: &Path, font: Option<&Path>) -> String {
    let font_opt = match font {
        Some(path) => format!("fontfile={}", escape_value(&path.to_string_lossy())),
        None => "font=Sans".to_string(),
    };
    let y = match overlay.style.position {
        Position::Center => "(h-text_h)/2".to_string(),
        Position::Top(px) => px.to_string(),
    };
    let mut filter = format!(
        "drawtext={}:textfile={}:expansion=none:fontsize={}:fontcolor={}:borderw={}:bordercolor=black:line_spacing=8:x=(w-text_w)/2:y={}:enable='between(t,{:.3},{:.3})'",
        font_opt,
        escape_value(&text_file.to_string_lossy()),
        overlay.style.font_size,
        overlay.style.color,
        STROKE_WIDTH,
        y,
        overlay.start,
        overlay.end(),
    );
    if let Some(alpha) = alpha_expr(overlay) {
        filter.push_str(&format!(":alpha='{}'", alpha));
    }
    filter
}

pub fn filter_graph(comp: &Composition, text_files: &[PathBuf], font: Option<&Path>) -> String {
    let mut graph = background_chain(comp);
    for (overlay, file) in comp.overlays.iter().zip(text_files) {
        graph.push(',');
        graph.push_str(&drawtext(overlay, file, font));
    }
    graph.push_str(",format=yuv420p[vout]");
    graph
}

pub fn build_args(
    comp: &Composition,
    text_files: &[PathBuf],
    font: Option<&Path>,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

    match &comp.background {
        BackgroundTrack::Clip { source, loops, .. } => {
            if *loops > 1 {
                args.extend(["-stream_loop".into(), (loops - 1).to_string()]);
            }
            args.extend(["-i".into(), source.to_string_lossy().into_owned()]);
        }
        BackgroundTrack::Solid {
            color,
            width,
            height,
            duration,
        } => {
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c={}:s={}x{}:r={}:d={:.3}",
                    color.hex(),
                    width,
                    height,
                    comp.fps,
                    duration
                ),
            ]);
        }
    }

    if comp.audio.offset > 0.0 {
        args.extend(["-itsoffset".into(), format!("{:.3}", comp.audio.offset)]);
    }
    args.extend(["-i".into(), comp.audio.source.to_string_lossy().into_owned()]);

    args.extend([
        "-filter_complex".into(),
        filter_graph(comp, text_files, font),
        "-map".into(),
        "[vout]".into(),
        "-map".into(),
        "1:a:0".into(),
        "-t".into(),
        format!("{:.3}", comp.duration),
        "-r".into(),
        comp.fps.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        output.to_string_lossy().into_owned(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footage::BackgroundAsset;
    use crate::narration::Story;
    use crate::timeline::{ReelSettings, compose};
    use crate::tts::NarrationAsset;

    fn comp(background: Option<BackgroundAsset>) -> Composition {
        let story = Story {
            title: "Imperial War Museum North".into(),
            narration: "It opened in 2002. The building looks like a shattered globe.".into(),
            search_phrase: "museum exhibition history".into(),
            hashtags: vec!["#Salford".into(), "#IWMNorth".into()],
        };
        let narration = NarrationAsset {
            path: PathBuf::from("/work/narration.mp3"),
            duration: 9.0,
        };
        compose(&story, &narration, background.as_ref(), &ReelSettings::default())
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| PathBuf::from(format!("/work/overlay_{:03}.txt", i)))
            .collect()
    }

    #[test]
    fn solid_background_uses_lavfi_color_source() {
        let c = comp(None);
        let args = build_args(&c, &files(c.overlays.len()), None, Path::new("/out/reel.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f lavfi -i color=c=0x1e1e1e:s=1080x1920:r=30:d=12.000"));
        assert!(joined.contains("-map [vout] -map 1:a:0 -t 12.000 -r 30"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert_eq!(args.last().unwrap(), "/out/reel.mp4");
        assert!(!joined.contains("-stream_loop"));
    }

    #[test]
    fn short_clip_is_stream_looped_and_cropped() {
        let c = comp(Some(BackgroundAsset {
            path: PathBuf::from("/work/background.mp4"),
            duration: 5.0,
            width: 1920,
            height: 1080,
        }));
        let args = build_args(&c, &files(c.overlays.len()), None, Path::new("/out/reel.mp4"));
        let pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[pos + 1], "2");
        assert_eq!(args[pos + 3], "/work/background.mp4");

        let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(graph.starts_with(
            "[0:v]scale=3414:1920,setsar=1,crop=1080:1920:1167:0,trim=duration=12.000"
        ));
        assert!(graph.ends_with(",format=yuv420p[vout]"));
    }

    #[test]
    fn every_overlay_becomes_a_timed_drawtext() {
        let c = comp(None);
        let graph = filter_graph(&c, &files(c.overlays.len()), None);
        assert_eq!(graph.matches("drawtext=").count(), 4);
        assert!(graph.contains("enable='between(t,0.000,3.000)'"));
        assert!(graph.contains("enable='between(t,3.000,7.500)'"));
        assert!(graph.contains("enable='between(t,7.500,12.000)'"));
        assert!(graph.contains("enable='between(t,10.000,12.000)'"));
        assert!(graph.contains("y=(h-text_h)/2"));
        assert!(graph.contains("y=1600"));
        assert!(graph.contains("fontcolor=lightblue"));
    }

    #[test]
    fn fade_expression_ramps_at_both_edges() {
        let c = comp(None);
        let title = &c.overlays[0];
        assert_eq!(
            alpha_expr(title).unwrap(),
            "if(lt(t,0.500),(t-0.000)/0.500,if(gt(t,2.500),(3.000-t)/0.500,1))"
        );
    }

    #[test]
    fn font_path_is_escaped() {
        let c = comp(None);
        let graph = filter_graph(
            &c,
            &files(c.overlays.len()),
            Some(Path::new("C:/fonts/Arial Bold.ttf")),
        );
        assert!(graph.contains("fontfile=C\\:/fonts/Arial Bold.ttf"));
    }

    #[test]
    fn captions_wrap_to_column() {
        let c = comp(None);
        let caption = &c.overlays[1];
        assert_eq!(line_width(caption), 32);
    }

    #[test]
    fn overlay_texts_are_written_wrapped() {
        let c = comp(None);
        let dir = tempfile::tempdir().unwrap();
        let written = write_overlay_texts(&c, dir.path()).unwrap();
        assert_eq!(written.len(), c.overlays.len());
        let caption = std::fs::read_to_string(&written[2]).unwrap();
        assert_eq!(caption, "The building looks like a\nshattered globe.");
    }

    #[test]
    fn partial_file_sits_next_to_output() {
        assert_eq!(
            partial_path(Path::new("/out/reel_20240507.mp4")),
            PathBuf::from("/out/.partial-reel_20240507.mp4")
        );
    }

    #[tokio::test]
    async fn failed_ffmpeg_leaves_no_output() {
        let c = comp(None);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reel.mp4");
        let renderer = FfmpegRenderer::new("definitely-not-ffmpeg", None);
        let err = renderer.render(&c, dir.path(), &output).await.unwrap_err();
        assert!(matches!(err, ReelError::Render(_)));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }
}
