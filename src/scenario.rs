use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uma_capture::{ScreenRegion, Screenshot};
use uma_data::normalize_name;
use uma_vision::{
    extract_text, stretch_contrast, LocateParams, MarkerLocator, RecognizedText, TemplateMatch,
    TextReader,
};

/// Training scenarios with their own screen quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Ura,
    NewScenario,
    UnityCup,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [
        ScenarioKind::Ura,
        ScenarioKind::NewScenario,
        ScenarioKind::UnityCup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::Ura => "ura",
            ScenarioKind::NewScenario => "new_scenario",
            ScenarioKind::UnityCup => "unity_cup",
        }
    }

    /// Parse a configured scenario name. Unknown names run as URA.
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .unwrap_or_else(|| {
                warn!("Unknown scenario '{}', using ura", name);
                ScenarioKind::Ura
            })
    }
}

pub type LocateChoicesFn =
    fn(&MarkerLocator, &Screenshot, &str, &LocateParams) -> Vec<TemplateMatch>;
pub type ReadEventNameFn =
    fn(&dyn TextReader, &Screenshot, &ScreenRegion) -> (RecognizedText, RgbaImage);
pub type ImageHook = fn(&RgbaImage) -> RgbaImage;

/// Operations every scenario provides.
#[derive(Clone, Copy)]
pub struct Operations {
    pub locate_choices: LocateChoicesFn,
    pub read_event_name: ReadEventNameFn,
}

fn default_locate_choices(
    locator: &MarkerLocator,
    screenshot: &Screenshot,
    template_id: &str,
    params: &LocateParams,
) -> Vec<TemplateMatch> {
    locator.locate_markers(screenshot, template_id, params)
}

fn default_read_event_name(
    reader: &dyn TextReader,
    screenshot: &Screenshot,
    region: &ScreenRegion,
) -> (RecognizedText, RgbaImage) {
    extract_text(reader, screenshot, region)
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            locate_choices: default_locate_choices,
            read_event_name: default_read_event_name,
        }
    }
}

/// Optional per-scenario hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Applied to the event name crop before OCR
    EventNamePreprocess,
}

/// Events whose choice is fixed regardless of rewards, per scenario.
const URA_OVERRIDES: &[(&str, usize)] = &[];
const NEW_SCENARIO_OVERRIDES: &[(&str, usize)] = &[];
const UNITY_CUP_OVERRIDES: &[(&str, usize)] = &[];

/// Normalize and merge a built-in override table with configured entries.
/// Configured entries replace built-in ones for the same event name.
fn merge_overrides(
    builtin: &[(&str, usize)],
    config_overrides: &BTreeMap<String, usize>,
) -> BTreeMap<String, usize> {
    let configured = config_overrides
        .iter()
        .map(|(name, ordinal)| (name.as_str(), *ordinal));

    let mut overrides = BTreeMap::new();
    for (name, ordinal) in builtin.iter().copied().chain(configured) {
        let key = normalize_name(name);
        if key.is_empty() || ordinal == 0 {
            warn!("Ignoring override '{}' -> {}", name, ordinal);
            continue;
        }
        overrides.insert(key, ordinal);
    }
    overrides
}

/// A scenario resolved into concrete operations, hooks and overrides.
#[derive(Clone)]
pub struct Scenario {
    kind: ScenarioKind,
    ops: Operations,
    capabilities: BTreeMap<Capability, ImageHook>,
    /// Normalized event name -> ordinal
    overrides: BTreeMap<String, usize>,
}

impl Scenario {
    /// Build the operation table for `kind`. `config_overrides` win over the
    /// scenario's built-in override table.
    pub fn new(kind: ScenarioKind, config_overrides: &BTreeMap<String, usize>) -> Self {
        let (ops, capabilities, builtin) = match kind {
            ScenarioKind::Ura => (Operations::default(), BTreeMap::new(), URA_OVERRIDES),
            ScenarioKind::NewScenario => (
                Operations::default(),
                BTreeMap::new(),
                NEW_SCENARIO_OVERRIDES,
            ),
            ScenarioKind::UnityCup => {
                let mut caps: BTreeMap<Capability, ImageHook> = BTreeMap::new();
                caps.insert(Capability::EventNamePreprocess, stretch_contrast);
                (Operations::default(), caps, UNITY_CUP_OVERRIDES)
            }
        };

        let overrides = merge_overrides(builtin, config_overrides);

        debug!(
            "Scenario {} ready: {} capabilities, {} overrides",
            kind.as_str(),
            capabilities.len(),
            overrides.len()
        );
        Self {
            kind,
            ops,
            capabilities,
            overrides,
        }
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn capability(&self, capability: Capability) -> Option<ImageHook> {
        self.capabilities.get(&capability).copied()
    }

    /// Fixed ordinal for `text`, compared after name normalization.
    pub fn override_for(&self, text: &str) -> Option<usize> {
        self.overrides.get(&normalize_name(text)).copied()
    }

    pub fn locate_choices(
        &self,
        locator: &MarkerLocator,
        screenshot: &Screenshot,
        template_id: &str,
        params: &LocateParams,
    ) -> Vec<TemplateMatch> {
        (self.ops.locate_choices)(locator, screenshot, template_id, params)
    }

    /// Read the event title, running the preprocess hook first when registered.
    pub fn read_event_name(
        &self,
        reader: &dyn TextReader,
        screenshot: &Screenshot,
        region: &ScreenRegion,
    ) -> (RecognizedText, RgbaImage) {
        match self.capability(Capability::EventNamePreprocess) {
            Some(preprocess) => {
                let crop = screenshot.crop(region);
                if crop.width() == 0 || crop.height() == 0 {
                    return (RecognizedText::failed(), crop);
                }
                let prepared = preprocess(&crop);
                (reader.read_text(&prepared), crop)
            }
            None => (self.ops.read_event_name)(reader, screenshot, region),
        }
    }
}
