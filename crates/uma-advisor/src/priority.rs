use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uma_data::EventOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub tag: String,
    pub polarity: Polarity,
}

/// Ordered reward tags. Earlier good tags outrank later ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    entries: Vec<PriorityEntry>,
}

/// On-disk format of event_priority.json
#[derive(Debug, Default, Deserialize)]
struct PriorityFile {
    #[serde(rename = "Good_choices", default)]
    good: Vec<String>,
    #[serde(rename = "Bad_choices", default)]
    bad: Vec<String>,
}

impl PriorityConfig {
    pub fn from_lists<G, B>(good: G, bad: B) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        let entries = good
            .into_iter()
            .map(|t| PriorityEntry {
                tag: t.into(),
                polarity: Polarity::Good,
            })
            .chain(bad.into_iter().map(|t| PriorityEntry {
                tag: t.into(),
                polarity: Polarity::Bad,
            }))
            .collect();
        Self { entries }
    }

    pub fn parse(json: &str) -> Result<Self> {
        let file: PriorityFile = serde_json::from_str(json.trim_start_matches('\u{feff}'))?;
        Ok(Self::from_lists(file.good, file.bad))
    }

    /// Load from a priority file. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Priority file {} not found, using empty priorities", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn entries(&self) -> &[PriorityEntry] {
        &self.entries
    }

    pub fn good_tags(&self) -> impl Iterator<Item = &str> {
        self.tags(Polarity::Good)
    }

    pub fn bad_tags(&self) -> impl Iterator<Item = &str> {
        self.tags(Polarity::Bad)
    }

    fn tags(&self, polarity: Polarity) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.polarity == polarity)
            .map(|e| e.tag.as_str())
    }

    /// Position of `tag` among the good tags; 0 is the highest priority.
    pub fn good_rank(&self, tag: &str) -> Option<usize> {
        self.good_tags().position(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Classify an option's reward lines against the configured tags.
    /// A tag applies when it occurs, case-insensitively, inside any reward line.
    pub fn tag_option(&self, option: &EventOption) -> TaggedOption {
        let rewards: Vec<String> = option.rewards.iter().map(|r| r.to_lowercase()).collect();
        let applies = |tag: &str| {
            let tag = tag.to_lowercase();
            !tag.is_empty() && rewards.iter().any(|r| r.contains(&tag))
        };
        TaggedOption {
            label: option.label.clone(),
            good_tags: self.good_tags().filter(|&t| applies(t)).map(str::to_string).collect(),
            bad_tags: self.bad_tags().filter(|&t| applies(t)).map(str::to_string).collect(),
        }
    }
}

/// An option reduced to the tags the priority config cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedOption {
    pub label: String,
    /// In priority order
    pub good_tags: Vec<String>,
    pub bad_tags: Vec<String>,
}

impl TaggedOption {
    pub fn new<G, B>(label: impl Into<String>, good: G, bad: B) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            label: label.into(),
            good_tags: good.into_iter().map(Into::into).collect(),
            bad_tags: bad.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_good(&self) -> bool {
        !self.good_tags.is_empty()
    }

    pub fn has_bad(&self) -> bool {
        !self.bad_tags.is_empty()
    }
}

/// Holds the live priority config. Readers take a whole snapshot; reloads
/// publish a fully parsed replacement or nothing.
pub struct PriorityStore {
    tx: watch::Sender<Arc<PriorityConfig>>,
    path: Option<PathBuf>,
}

impl PriorityStore {
    pub fn new(config: PriorityConfig) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx, path: None }
    }

    /// Load from `path` and remember it for later `reload` calls.
    pub fn open(path: &Path) -> Result<Self> {
        let config = PriorityConfig::load(path)?;
        info!(
            "Loaded priorities: {} good, {} bad",
            config.good_tags().count(),
            config.bad_tags().count()
        );
        let mut store = Self::new(config);
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// The config a decision cycle should use from start to finish.
    pub fn snapshot(&self) -> Arc<PriorityConfig> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PriorityConfig>> {
        self.tx.subscribe()
    }

    pub fn replace(&self, config: PriorityConfig) {
        self.tx.send_replace(Arc::new(config));
    }

    /// Re-read the backing file. On error the current snapshot stays in place.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let config = PriorityConfig::load(path)?;
        info!("Reloaded priorities from {}", path.display());
        self.replace(config);
        Ok(())
    }
}
