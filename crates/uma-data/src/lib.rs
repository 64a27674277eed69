use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

mod matcher;

pub use matcher::{normalize_name, MatchTier, DEFAULT_MIN_SUBSTRING_LEN};

/// The knowledge-base table an event was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceTable {
    SupportCard,
    Character,
    Finale,
}

impl SourceTable {
    pub const ALL: [SourceTable; 3] = [
        SourceTable::SupportCard,
        SourceTable::Character,
        SourceTable::Finale,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            SourceTable::SupportCard => "support_card.json",
            SourceTable::Character => "uma_data.json",
            SourceTable::Finale => "ura_finale.json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceTable::SupportCard => "Support Card",
            SourceTable::Character => "Uma Data",
            SourceTable::Finale => "Ura Finale",
        }
    }
}

/// One selectable outcome of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOption {
    /// On-screen label, e.g. "Top Option" or "Option 3"
    pub label: String,
    /// One entry per reward line
    pub rewards: Vec<String>,
}

impl EventOption {
    pub fn new(label: impl Into<String>, reward_text: &str) -> Self {
        Self {
            label: label.into(),
            rewards: split_reward_lines(reward_text),
        }
    }

    /// Reward lines joined on one line for logging.
    pub fn rewards_inline(&self) -> String {
        self.rewards.join(", ")
    }

    /// 1-based slot the label names on screen: top/middle/bottom or "Option N".
    /// `None` for labels that name no position.
    pub fn screen_position(&self) -> Option<usize> {
        let lower = self.label.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for (i, word) in words.iter().enumerate() {
            let Some(rest) = word.strip_prefix("option") else {
                continue;
            };
            let digits = if rest.is_empty() {
                words.get(i + 1).copied().unwrap_or_default()
            } else {
                rest
            };
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
        }

        if words.contains(&"top") {
            Some(1)
        } else if words.contains(&"middle") {
            Some(2)
        } else if words.contains(&"bottom") {
            Some(3)
        } else {
            None
        }
    }
}

/// A named event and its options, possibly merged from several tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub options: Vec<EventOption>,
    pub sources: Vec<SourceTable>,
}

impl EventRecord {
    pub fn source_label(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    fn primary_source(&self) -> Option<SourceTable> {
        self.sources.iter().min().copied()
    }
}

/// Merge records describing the same event.
///
/// Options sharing a label have their reward lines unioned. Records are
/// visited in canonical table order, so the result does not depend on the
/// order the inputs arrive in. Options end up in on-screen order; labels
/// without a position keep their first-seen order after the positioned ones.
pub fn merge_records(records: &[EventRecord]) -> Option<EventRecord> {
    let mut ordered: Vec<&EventRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.primary_source()
            .cmp(&b.primary_source())
            .then_with(|| a.name.cmp(&b.name))
    });

    let first = ordered.first()?;
    let mut merged = EventRecord {
        name: first.name.clone(),
        options: Vec::new(),
        sources: Vec::new(),
    };

    for record in ordered {
        for source in &record.sources {
            if !merged.sources.contains(source) {
                merged.sources.push(*source);
            }
        }
        for option in &record.options {
            match merged.options.iter_mut().find(|o| o.label == option.label) {
                Some(existing) => {
                    for reward in &option.rewards {
                        if !existing.rewards.contains(reward) {
                            existing.rewards.push(reward.clone());
                        }
                    }
                }
                None => merged.options.push(option.clone()),
            }
        }
    }
    merged.sources.sort();
    merged
        .options
        .sort_by_key(|o| o.screen_position().unwrap_or(usize::MAX));

    Some(merged)
}

fn split_reward_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Raw event entry as stored in the JSON tables
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "EventName", default)]
    name: String,
    #[serde(rename = "EventOptions", default)]
    options: serde_json::Map<String, serde_json::Value>,
}

/// Character entry in uma_data.json
#[derive(Debug, Deserialize)]
struct RawCharacter {
    #[serde(rename = "UmaEvents", default)]
    events: Vec<RawEvent>,
}

impl RawEvent {
    fn into_record(self, source: SourceTable) -> Option<EventRecord> {
        if self.name.trim().is_empty() {
            return None;
        }
        let options = self
            .options
            .into_iter()
            .map(|(label, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                EventOption::new(label, &text)
            })
            .collect();
        Some(EventRecord {
            name: self.name,
            options,
            sources: vec![source],
        })
    }
}

/// Read-only event catalog with exact and fuzzy lookup
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    /// Normalized name -> merged record
    events: BTreeMap<String, EventRecord>,
    min_substring_len: usize,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            min_substring_len: DEFAULT_MIN_SUBSTRING_LEN,
        }
    }
}

impl KnowledgeBase {
    /// Load the event tables from `events_dir`.
    /// Expects any of:
    ///   - events_dir/support_card.json
    ///   - events_dir/uma_data.json
    ///   - events_dir/ura_finale.json
    pub fn load(events_dir: &Path) -> Result<Self> {
        let mut records = Vec::new();

        for table in SourceTable::ALL {
            let path = events_dir.join(table.file_name());
            if !path.exists() {
                tracing::warn!("No {} found at {}", table.label(), path.display());
                continue;
            }

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let content = content.trim_start_matches('\u{feff}');
            let table_records = parse_table(table, content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            tracing::info!("Loaded {} {} events", table_records.len(), table.label());
            records.extend(table_records);
        }

        let kb = Self::from_records(records);
        tracing::info!("Knowledge base ready: {} distinct events", kb.event_count());
        Ok(kb)
    }

    /// Build from already-parsed records, merging those that share a normalized name.
    pub fn from_records(records: Vec<EventRecord>) -> Self {
        let mut grouped: BTreeMap<String, Vec<EventRecord>> = BTreeMap::new();
        for record in records {
            let key = normalize_name(&record.name);
            if key.is_empty() {
                continue;
            }
            grouped.entry(key).or_default().push(record);
        }

        let events = grouped
            .into_iter()
            .filter_map(|(key, group)| merge_records(&group).map(|merged| (key, merged)))
            .collect();

        Self {
            events,
            ..Self::default()
        }
    }

    pub fn with_min_substring_len(mut self, len: usize) -> Self {
        self.min_substring_len = len;
        self
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Resolve recognized text to known events, best first. Empty means unknown.
    pub fn resolve(&self, text: &str) -> Vec<&EventRecord> {
        self.lookup(text)
            .map(|(_, records)| records)
            .unwrap_or_default()
    }

    /// Like `resolve`, also reporting which tier produced the hits.
    pub fn lookup(&self, text: &str) -> Option<(MatchTier, Vec<&EventRecord>)> {
        let query = normalize_name(text);
        if query.is_empty() {
            return None;
        }

        if let Some(record) = self.events.get(&query) {
            return Some((MatchTier::Exact, vec![record]));
        }

        for tier in MatchTier::FUZZY {
            if tier == MatchTier::Substring && query.chars().count() < self.min_substring_len {
                continue;
            }
            let mut hits: Vec<(&String, &EventRecord)> = self
                .events
                .iter()
                .filter(|(name, _)| tier.matches(name, &query))
                .collect();
            if hits.is_empty() {
                continue;
            }
            hits.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(b.0)));
            tracing::debug!(
                "Fuzzy lookup '{}' matched {} event(s) at tier {:?}",
                text,
                hits.len(),
                tier
            );
            return Some((tier, hits.into_iter().map(|(_, r)| r).collect()));
        }

        None
    }
}

fn parse_table(table: SourceTable, content: &str) -> Result<Vec<EventRecord>> {
    let raw_events: Vec<RawEvent> = match table {
        SourceTable::Character => {
            let characters: Vec<RawCharacter> = serde_json::from_str(content)?;
            characters.into_iter().flat_map(|c| c.events).collect()
        }
        SourceTable::SupportCard | SourceTable::Finale => serde_json::from_str(content)?,
    };
    Ok(raw_events
        .into_iter()
        .filter_map(|e| e.into_record(table))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, source: SourceTable, options: &[(&str, &str)]) -> EventRecord {
        EventRecord {
            name: name.to_string(),
            options: options
                .iter()
                .map(|(label, reward)| EventOption::new(*label, reward))
                .collect(),
            sources: vec![source],
        }
    }

    #[test]
    fn test_load_nonexistent() {
        let kb = KnowledgeBase::load(Path::new("/nonexistent")).unwrap();
        assert!(kb.is_empty());
    }

    #[test]
    fn test_load_all_tables() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("support_card.json"),
            "\u{feff}[{\"EventName\":\"Dance Lesson\",\"EventOptions\":{\"Top Option\":\"Speed +10\\nSkill points +15\",\"Bottom Option\":\"Energy -10\"}}]",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("uma_data.json"),
            r#"[{"UmaName":"Special Week","UmaEvents":[{"EventName":"New Year's Resolutions","EventOptions":{"Top Option":"Stamina +10"}}]}]"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("ura_finale.json"),
            r#"[{"EventName":"Dance Lesson","EventOptions":{"Top Option":"Guts +5"}}]"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(tmp.path()).unwrap();
        assert_eq!(kb.event_count(), 2);

        let hits = kb.resolve("dance  lesson");
        assert_eq!(hits.len(), 1);
        let dance = hits[0];
        assert_eq!(dance.sources, vec![SourceTable::SupportCard, SourceTable::Finale]);
        assert_eq!(dance.options[0].label, "Top Option");
        assert_eq!(
            dance.options[0].rewards,
            vec!["Speed +10", "Skill points +15", "Guts +5"]
        );
        assert_eq!(dance.options[1].label, "Bottom Option");
    }

    #[test]
    fn test_malformed_table_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("ura_finale.json"), "{not json").unwrap();
        assert!(KnowledgeBase::load(tmp.path()).is_err());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = record("Shrine Visit", SourceTable::SupportCard, &[("Top Option", "Speed +5")]);
        let b = record(
            "Shrine Visit",
            SourceTable::Character,
            &[("Bottom Option", "Energy +10"), ("Top Option", "Power +5")],
        );
        let c = record("Shrine Visit", SourceTable::Finale, &[("Top Option", "Speed +5\nWit +3")]);

        let forward = merge_records(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = merge_records(&[c.clone(), b.clone(), a.clone()]).unwrap();
        let shuffled = merge_records(&[b, a, c]).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.options.len(), 2);
        assert_eq!(forward.options[0].rewards, vec!["Speed +5", "Power +5", "Wit +3"]);
        assert_eq!(forward.source_label(), "Support Card + Uma Data + Ura Finale");
    }

    #[test]
    fn test_partial_table_merge_keeps_screen_order() {
        let card = record("Study Session", SourceTable::SupportCard, &[("Bottom Option", "Speed +5")]);
        let chara = record(
            "Study Session",
            SourceTable::Character,
            &[("Top Option", "Speed +5"), ("Bottom Option", "Wit +5")],
        );
        let merged = merge_records(&[card, chara]).unwrap();
        let labels: Vec<&str> = merged.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Top Option", "Bottom Option"]);
        assert_eq!(merged.options[1].rewards, vec!["Speed +5", "Wit +5"]);
    }

    #[test]
    fn test_numbered_options_sorted_by_number() {
        let merged = merge_records(&[record(
            "Fan Letter",
            SourceTable::Character,
            &[("Option 3", "Guts +5"), ("Option 1", "Speed +5"), ("Option2", "Wit +5")],
        )])
        .unwrap();
        let labels: Vec<&str> = merged.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Option 1", "Option2", "Option 3"]);
    }

    #[test]
    fn test_screen_position() {
        assert_eq!(EventOption::new("Top Option", "").screen_position(), Some(1));
        assert_eq!(EventOption::new("Middle Option", "").screen_position(), Some(2));
        assert_eq!(EventOption::new("Bottom Option", "").screen_position(), Some(3));
        assert_eq!(EventOption::new("Option 4", "").screen_position(), Some(4));
        assert_eq!(EventOption::new("Accept", "").screen_position(), None);
    }

    #[test]
    fn test_merge_never_invents_options() {
        let a = record("Rest", SourceTable::SupportCard, &[("Top Option", "Energy +30")]);
        let b = record("Rest", SourceTable::Finale, &[("Top Option", "Mood +1")]);
        let merged = merge_records(&[a, b]).unwrap();
        assert_eq!(merged.options.len(), 1);
        assert_eq!(merged.options[0].rewards, vec!["Energy +30", "Mood +1"]);
    }

    #[test]
    fn test_exact_beats_fuzzy() {
        let kb = KnowledgeBase::from_records(vec![
            record("Training", SourceTable::SupportCard, &[]),
            record("Training Camp", SourceTable::SupportCard, &[]),
        ]);
        let (tier, hits) = kb.lookup("training").unwrap();
        assert_eq!(tier, MatchTier::Exact);
        assert_eq!(hits[0].name, "Training");
    }

    #[test]
    fn test_prefix_tier_wins_over_substring() {
        let kb = KnowledgeBase::from_records(vec![
            record("Summer Camp Begins", SourceTable::SupportCard, &[]),
            record("End of Summer Camp", SourceTable::Character, &[]),
        ]);
        let (tier, hits) = kb.lookup("Summer Cam").unwrap();
        assert_eq!(tier, MatchTier::Prefix);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Summer Camp Begins");
    }

    #[test]
    fn test_whole_word_tier_wins_over_substring() {
        let kb = KnowledgeBase::from_records(vec![
            record("A Hearty Dinner", SourceTable::SupportCard, &[]),
            record("Candlelit Dinnertime", SourceTable::Finale, &[]),
        ]);
        let (tier, hits) = kb.lookup("Dinner").unwrap();
        assert_eq!(tier, MatchTier::WholeWord);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "A Hearty Dinner");
    }

    #[test]
    fn test_short_substring_ignored() {
        let kb = KnowledgeBase::from_records(vec![record("Karaoke Night", SourceTable::SupportCard, &[])]);
        assert!(kb.resolve("aoke").is_empty());
        assert_eq!(kb.resolve("raoke")[0].name, "Karaoke Night");
        let strict = kb.clone().with_min_substring_len(8);
        assert!(strict.resolve("raoke").is_empty());
    }

    #[test]
    fn test_unknown_is_empty() {
        let kb = KnowledgeBase::from_records(vec![record("Karaoke Night", SourceTable::SupportCard, &[])]);
        assert!(kb.resolve("Fishing Trip").is_empty());
        assert!(kb.resolve("   ").is_empty());
    }

    #[test]
    fn test_chain_markers_ignored() {
        let kb = KnowledgeBase::from_records(vec![record(
            "(❯❯) Tracen Festival",
            SourceTable::SupportCard,
            &[],
        )]);
        let (tier, hits) = kb.lookup("Tracen Festival").unwrap();
        assert_eq!(tier, MatchTier::Exact);
        assert_eq!(hits[0].name, "(❯❯) Tracen Festival");
    }
}
