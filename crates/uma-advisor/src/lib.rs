//! Priority ranking of event options and mapping of the winner to an on-screen choice.

mod mapper;
mod priority;
mod resolver;

pub use mapper::{map_label_to_ordinal, map_with_vocabulary, MappingError};
pub use priority::{Polarity, PriorityConfig, PriorityEntry, PriorityStore, TaggedOption};
pub use resolver::{resolve, Resolution, ResolutionRule};

use uma_data::EventRecord;

/// Tag every option of `record` and pick the recommended one.
pub fn analyze(record: &EventRecord, config: &PriorityConfig) -> (Vec<TaggedOption>, Option<Resolution>) {
    let tagged: Vec<TaggedOption> = record
        .options
        .iter()
        .map(|o| config.tag_option(o))
        .collect();
    let resolution = resolve(&tagged, config);
    (tagged, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uma_data::{EventOption, SourceTable};

    #[test]
    fn test_analyze_record() {
        let record = EventRecord {
            name: "Extra Training".into(),
            options: vec![
                EventOption::new("Top Option", "Energy -5\nPower +5"),
                EventOption::new("Bottom Option", "Energy +5"),
            ],
            sources: vec![SourceTable::SupportCard],
        };
        let config = PriorityConfig::from_lists(["Power", "Energy +"], ["Energy -"]);
        let (tagged, resolution) = analyze(&record, &config);
        assert_eq!(tagged.len(), 2);
        assert!(tagged[0].has_bad());
        let resolution = resolution.unwrap();
        assert_eq!(resolution.label, "Bottom Option");
        assert_eq!(resolution.rule, ResolutionRule::CleanWin);
    }

    #[test]
    fn test_tie_after_partial_merge_picks_topmost() {
        let kb = uma_data::KnowledgeBase::from_records(vec![
            EventRecord {
                name: "Study Session".into(),
                options: vec![EventOption::new("Bottom Option", "Speed +5")],
                sources: vec![SourceTable::SupportCard],
            },
            EventRecord {
                name: "Study Session".into(),
                options: vec![
                    EventOption::new("Top Option", "Speed +5"),
                    EventOption::new("Bottom Option", "Speed +5"),
                ],
                sources: vec![SourceTable::Character],
            },
        ]);
        let record = kb.resolve("Study Session")[0];
        let config = PriorityConfig::from_lists(["Speed"], Vec::<String>::new());

        let (_, resolution) = analyze(record, &config);
        let resolution = resolution.unwrap();
        assert_eq!(resolution.label, "Top Option");
        assert_eq!(map_label_to_ordinal(&resolution.label, 2), Ok(1));
    }
}
