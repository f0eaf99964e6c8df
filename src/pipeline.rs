use crate::args::Args;
use crate::catalog::{Catalog, DayOrdinal, select};
use crate::config::{Credentials, Timeouts, reel_settings};
use crate::error::{ReelError, Result, Stage, with_timeout};
use crate::footage::{FootageQuery, FootageSource, PexelsClient, resolve_background};
use crate::narration::{GeminiNarrator, NarrationProvider, NarratorKind, Story, TemplateNarrator};
use crate::render::FfmpegRenderer;
use crate::subtitle::write_srt;
use crate::timeline::{Composition, ReelSettings, compose};
use crate::tts::{
    EdgeTtsSynthesizer, PiperSynthesizer, SpeechSynthesizer, SynthesizerKind,
    synthesize_narration,
};
use crate::utils::word_count;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("dailyreel/", env!("CARGO_PKG_VERSION"));

pub struct Pipeline {
    pub(crate) catalog: Catalog,
    pub(crate) day_ordinal: DayOrdinal,
    pub(crate) narrator: Box<dyn NarrationProvider>,
    pub(crate) synthesizer: Box<dyn SpeechSynthesizer>,
    pub(crate) footage: Box<dyn FootageSource>,
    pub(crate) renderer: FfmpegRenderer,
    pub(crate) settings: ReelSettings,
    pub(crate) timeouts: Timeouts,
    pub(crate) locale: String,
    pub(crate) max_words: usize,
    pub(crate) output_dir: PathBuf,
    pub(crate) prefix: String,
    pub(crate) write_srt: bool,
    pub(crate) scratch_root: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub output: PathBuf,
    pub srt: Option<PathBuf>,
    pub topic: String,
    pub words: usize,
    pub duration: f64,
}

/// Temp workspace for one run; removed on drop whatever the outcome.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn create(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("dailyreel-")
            .tempdir_in(root)?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Workspace { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}

pub fn output_path(dir: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_{}.mp4", prefix, date.format("%Y%m%d")))
}

impl Pipeline {
    /// Wires up providers from the command line. Credentials must already
    /// have passed pre-flight.
    pub fn from_args(args: &Args, creds: Credentials) -> Result<Self> {
        let timeouts = Timeouts::from_args(args)?;
        let settings = reel_settings(args)?;
        let catalog = match &args.catalog {
            Some(path) => Catalog::from_file(path)?,
            None => Catalog::builtin(),
        };

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeouts.call)
            .build()
            .map_err(|e| ReelError::config(format!("cannot build HTTP client: {}", e)))?;

        let narrator: Box<dyn NarrationProvider> = match args.narrator {
            NarratorKind::Gemini => Box::new(GeminiNarrator::new(
                client.clone(),
                creds.gemini_api_key,
                args.gemini_model.clone(),
                args.gemini_base_url.clone(),
            )),
            NarratorKind::Template => Box::new(TemplateNarrator),
        };
        let synthesizer: Box<dyn SpeechSynthesizer> = match args.synthesizer {
            SynthesizerKind::Edge => Box::new(EdgeTtsSynthesizer::new(args.edge_tts_bin.clone())),
            SynthesizerKind::Piper => Box::new(PiperSynthesizer::new(
                args.piper_bin.clone(),
                args.piper_models.clone(),
            )),
        };
        let footage = Box::new(PexelsClient::new(
            client,
            creds.pexels_api_key,
            args.pexels_base_url.clone(),
        ));

        Ok(Pipeline {
            catalog,
            day_ordinal: args.day_ordinal,
            narrator,
            synthesizer,
            footage,
            renderer: FfmpegRenderer::new("ffmpeg", args.font.clone()),
            settings,
            timeouts,
            locale: args.locale.clone(),
            max_words: args.max_words,
            output_dir: args.output_dir.clone(),
            prefix: args.prefix.clone(),
            write_srt: args.srt,
            scratch_root: std::env::temp_dir(),
        })
    }

    async fn prepare(&self, date: NaiveDate, work_dir: &Path) -> Result<(Story, Composition)> {
        let topic = select(&self.catalog, date, self.day_ordinal);
        info!("Today's topic ({}): {}", date, topic.title);

        let text = with_timeout(
            Stage::Narration,
            self.timeouts.call,
            self.narrator.narrate(topic),
        )
        .await?;
        let story = Story::build(topic, &text, self.max_words);
        info!(
            "Story from {} ({} words): {:.200}",
            self.narrator.name(),
            word_count(&story.narration),
            story.narration
        );

        let query = FootageQuery::portrait(&story.search_phrase, self.settings.width);
        let (narration, background) = tokio::try_join!(
            with_timeout(
                Stage::Speech,
                self.timeouts.call,
                synthesize_narration(
                    self.synthesizer.as_ref(),
                    &story.narration,
                    &self.locale,
                    work_dir,
                ),
            ),
            resolve_background(self.footage.as_ref(), &query, work_dir, &self.timeouts),
        )?;

        let composition = compose(&story, &narration, background.as_ref(), &self.settings);
        info!(
            "Composed {:.2}s timeline with {} captions",
            composition.duration,
            composition.captions().count()
        );
        Ok((story, composition))
    }

    /// Runs every provider and returns the composition without rendering.
    pub async fn plan(&self, date: NaiveDate) -> Result<Composition> {
        let workspace = Workspace::create(&self.scratch_root)?;
        let result = self.prepare(date, workspace.path()).await;
        workspace.close();
        result.map(|(_, composition)| composition)
    }

    pub async fn run(&self, date: NaiveDate) -> Result<RunSummary> {
        let workspace = Workspace::create(&self.scratch_root)?;
        let result = self.run_in(date, workspace.path()).await;
        workspace.close();
        result
    }

    async fn run_in(&self, date: NaiveDate, work_dir: &Path) -> Result<RunSummary> {
        let (story, composition) = self.prepare(date, work_dir).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = output_path(&self.output_dir, &self.prefix, date);
        self.renderer.render(&composition, work_dir, &output).await?;

        let srt = if self.write_srt {
            let path = output.with_extension("srt");
            write_srt(&path, composition.captions())?;
            info!("Captions written to {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok(RunSummary {
            output,
            srt,
            topic: story.title,
            words: word_count(&story.narration),
            duration: composition.duration,
        })
    }
}
