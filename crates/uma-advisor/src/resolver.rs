use serde::{Deserialize, Serialize};

use crate::priority::{PriorityConfig, TaggedOption};

/// Which rule picked the winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionRule {
    /// Has good tags and no bad tags
    CleanWin,
    /// Every candidate carries something bad; best good tag still decides
    BestGood,
    /// Nothing good anywhere; least bad wins
    FewestBad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Index into the options slice (on-screen order)
    pub index: usize,
    pub label: String,
    pub rule: ResolutionRule,
    pub rationale: String,
}

/// Rank of an option's best good tag; unknown tags rank last.
fn best_rank(option: &TaggedOption, config: &PriorityConfig) -> Option<usize> {
    option
        .good_tags
        .iter()
        .map(|t| config.good_rank(t).unwrap_or(usize::MAX))
        .min()
}

fn best_tag<'a>(option: &'a TaggedOption, config: &PriorityConfig) -> &'a str {
    option
        .good_tags
        .iter()
        .min_by_key(|t| config.good_rank(t).unwrap_or(usize::MAX))
        .map(String::as_str)
        .unwrap_or_default()
}

/// Pick one option under a fixed total order.
///
/// 1. Options with good tags and no bad tags: best good tag wins, ties go to
///    the earlier option.
/// 2. Otherwise options with any good tag: best good tag, then fewest bad
///    tags, then earlier option.
/// 3. Otherwise fewest bad tags, then earlier option.
///
/// Returns `None` only for an empty option list.
pub fn resolve(options: &[TaggedOption], config: &PriorityConfig) -> Option<Resolution> {
    let clean = options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.has_good() && !o.has_bad())
        .filter_map(|(i, o)| best_rank(o, config).map(|rank| (rank, i)))
        .min();
    if let Some((_, index)) = clean {
        let option = &options[index];
        return Some(Resolution {
            index,
            label: option.label.clone(),
            rule: ResolutionRule::CleanWin,
            rationale: format!(
                "Recommended based on highest priority good choice: '{}'",
                best_tag(option, config)
            ),
        });
    }

    let good = options
        .iter()
        .enumerate()
        .filter_map(|(i, o)| best_rank(o, config).map(|rank| (rank, o.bad_tags.len(), i)))
        .min();
    if let Some((_, bad_count, index)) = good {
        let option = &options[index];
        return Some(Resolution {
            index,
            label: option.label.clone(),
            rule: ResolutionRule::BestGood,
            rationale: format!(
                "All options have bad choices. Recommended based on highest priority good choice: '{}' ({} bad)",
                best_tag(option, config),
                bad_count
            ),
        });
    }

    let (bad_count, index) = options
        .iter()
        .enumerate()
        .map(|(i, o)| (o.bad_tags.len(), i))
        .min()?;
    Some(Resolution {
        index,
        label: options[index].label.clone(),
        rule: ResolutionRule::FewestBad,
        rationale: format!(
            "No clean options available. Selected option with fewest bad choices: {} bad choices",
            bad_count
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    fn config() -> PriorityConfig {
        PriorityConfig::from_lists(["Skill points", "Speed", "Stamina"], ["Energy -", "Mood -"])
    }

    #[test]
    fn test_clean_option_beats_higher_ranked_dirty_one() {
        let options = vec![
            TaggedOption::new("Top Option", ["Skill points"], ["Energy -"]),
            TaggedOption::new("Bottom Option", ["Stamina"], NONE),
        ];
        let r = resolve(&options, &config()).unwrap();
        assert_eq!(r.index, 1);
        assert_eq!(r.rule, ResolutionRule::CleanWin);
    }

    #[test]
    fn test_speed_over_energy_penalty() {
        let options = vec![
            TaggedOption::new("Top Option", ["Speed"], NONE),
            TaggedOption::new("Bottom Option", NONE, ["Energy -"]),
        ];
        let r = resolve(&options, &config()).unwrap();
        assert_eq!(r.index, 0);
        assert_eq!(r.label, "Top Option");
    }

    #[test]
    fn test_clean_tie_goes_to_first() {
        let options = vec![
            TaggedOption::new("Top Option", ["Speed"], NONE),
            TaggedOption::new("Middle Option", ["Speed", "Stamina"], NONE),
        ];
        assert_eq!(resolve(&options, &config()).unwrap().index, 0);
    }

    #[test]
    fn test_all_dirty_uses_best_good_then_fewest_bad() {
        let options = vec![
            TaggedOption::new("Top Option", ["Speed"], ["Energy -", "Mood -"]),
            TaggedOption::new("Middle Option", ["Stamina"], ["Energy -"]),
            TaggedOption::new("Bottom Option", ["Speed"], ["Mood -"]),
        ];
        let r = resolve(&options, &config()).unwrap();
        assert_eq!(r.index, 2);
        assert_eq!(r.rule, ResolutionRule::BestGood);
    }

    #[test]
    fn test_nothing_good_picks_fewest_bad() {
        let options = vec![
            TaggedOption::new("Top Option", NONE, ["Energy -", "Mood -"]),
            TaggedOption::new("Middle Option", NONE, NONE),
            TaggedOption::new("Bottom Option", NONE, NONE),
        ];
        let r = resolve(&options, &config()).unwrap();
        assert_eq!(r.index, 1);
        assert_eq!(r.rule, ResolutionRule::FewestBad);
    }

    #[test]
    fn test_empty_options() {
        assert!(resolve(&[], &config()).is_none());
    }

    #[test]
    fn test_deterministic_across_calls() {
        let options = vec![
            TaggedOption::new("Option 1", ["Stamina"], ["Mood -"]),
            TaggedOption::new("Option 2", ["Stamina"], ["Mood -"]),
            TaggedOption::new("Option 3", NONE, ["Energy -"]),
            TaggedOption::new("Option 4", ["Stamina"], ["Energy -"]),
        ];
        let first = resolve(&options, &config()).unwrap();
        for _ in 0..20 {
            assert_eq!(resolve(&options, &config()).unwrap(), first);
        }
        assert_eq!(first.index, 0);
    }
}
