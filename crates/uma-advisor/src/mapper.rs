use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static OPTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)option\s*(?P<n>\d+)").expect("valid option regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("ordinal {ordinal} is outside 1..={detected}")]
    OutOfRange { ordinal: usize, detected: usize },

    #[error("label '{label}' has no position among {choices} choices")]
    UnrecognizedLabel { label: String, choices: usize },
}

/// Map a resolver label to a 1-based on-screen ordinal.
///
/// With 2 choices the vocabulary is top/bottom, with 3 top/middle/bottom; with
/// 4 or more only explicit "Option N" labels are understood. "Option N" is
/// accepted at any count.
pub fn map_label_to_ordinal(label: &str, detected: usize) -> Result<usize, MappingError> {
    map_with_vocabulary(label, detected, detected)
}

/// Like `map_label_to_ordinal`, but reads positional words against
/// `choices` options (the entity's own option count) and then checks the
/// result against what was actually `detected` on screen.
pub fn map_with_vocabulary(
    label: &str,
    choices: usize,
    detected: usize,
) -> Result<usize, MappingError> {
    let ordinal = explicit_number(label)
        .or_else(|| positional(label, choices))
        .ok_or_else(|| MappingError::UnrecognizedLabel {
            label: label.to_string(),
            choices,
        })?;

    if ordinal == 0 || ordinal > detected {
        return Err(MappingError::OutOfRange { ordinal, detected });
    }
    Ok(ordinal)
}

fn explicit_number(label: &str) -> Option<usize> {
    OPTION_NUMBER
        .captures(label)
        .and_then(|c| c.name("n"))
        .and_then(|m| m.as_str().parse().ok())
}

fn positional(label: &str, choices: usize) -> Option<usize> {
    let lower = label.to_lowercase();
    let has_word = |word: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == word)
    };

    match choices {
        1 if has_word("top") => Some(1),
        2 if has_word("top") => Some(1),
        2 if has_word("bottom") => Some(2),
        3 if has_word("top") => Some(1),
        3 if has_word("middle") => Some(2),
        3 if has_word("bottom") => Some(3),
        _ => None,
    }
}
