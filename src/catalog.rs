use crate::error::{ReelError, Result};
use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_HASHTAGS: [&str; 2] = ["#Salford", "#Stories"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub search_phrase: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl Topic {
    fn builtin(title: &str, search_phrase: &str) -> Self {
        Topic {
            title: title.to_string(),
            search_phrase: search_phrase.to_string(),
            hashtags: Vec::new(),
        }
    }

    /// Hashtags for the closing card, falling back to the defaults.
    pub fn hashtags_or_default(&self) -> Vec<String> {
        if self.hashtags.is_empty() {
            DEFAULT_HASHTAGS.iter().map(|s| s.to_string()).collect()
        } else {
            self.hashtags.clone()
        }
    }
}

/// Which calendar number drives rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DayOrdinal {
    #[default]
    Month,
    Year,
}

impl DayOrdinal {
    pub fn of(self, date: NaiveDate) -> u32 {
        match self {
            DayOrdinal::Month => date.day(),
            DayOrdinal::Year => date.ordinal(),
        }
    }
}

/// Ordered, non-empty list of topics.
#[derive(Debug, Clone)]
pub struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    pub fn new(topics: Vec<Topic>) -> Result<Self> {
        if topics.is_empty() {
            return Err(ReelError::config("topic catalog is empty"));
        }
        if let Some(bad) = topics
            .iter()
            .find(|t| t.title.trim().is_empty() || t.search_phrase.trim().is_empty())
        {
            return Err(ReelError::config(format!(
                "catalog entry {:?} needs both a title and a search phrase",
                bad.title
            )));
        }
        Ok(Catalog { topics })
    }

    pub fn builtin() -> Self {
        let topics = vec![
            Topic::builtin(
                "Salford Quays history and transformation",
                "salford quays modern architecture waterfront",
            ),
            Topic::builtin(
                "MediaCityUK and the BBC",
                "modern office building media technology",
            ),
            Topic::builtin("The Lowry Theatre and arts scene", "modern theatre art gallery"),
            Topic::builtin(
                "Salford's industrial heritage",
                "industrial heritage factory brick building",
            ),
            Topic::builtin(
                "Ordsall Hall and historic buildings",
                "historic english manor house",
            ),
            Topic::builtin(
                "Salford shopping at the Lowry Outlet",
                "modern shopping mall retail",
            ),
            Topic::builtin(
                "University of Salford innovation",
                "university campus students learning",
            ),
            Topic::builtin("Salford parks and green spaces", "urban park green space nature"),
            Topic::builtin(
                "Local Salford food and restaurants",
                "restaurant dining food british",
            ),
            Topic::builtin("Salford Lads Club history", "community center youth club"),
            Topic::builtin("Chapel Street regeneration", "urban street modern development"),
            Topic::builtin("Salford Red Devils rugby", "rugby match sports stadium"),
            Topic::builtin("Imperial War Museum North", "museum exhibition history"),
            Topic::builtin("Salford community and culture", "salford city modern urban"),
            Topic::builtin("Hidden gems in Salford", "salford city modern urban"),
        ];
        Catalog { topics }
    }

    /// Loads a JSON array of topics.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            ReelError::config(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let topics: Vec<Topic> = serde_json::from_str(&data).map_err(|e| {
            ReelError::config(format!("invalid catalog {}: {}", path.display(), e))
        })?;
        info!("Loaded {} topics from {}", topics.len(), path.display());
        Catalog::new(topics)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }
}

/// Topic for `date`: `catalog[ordinal mod N]`.
pub fn select(catalog: &Catalog, date: NaiveDate, ordinal: DayOrdinal) -> &Topic {
    let index = ordinal.of(date) as usize % catalog.len();
    &catalog.topics()[index]
}
