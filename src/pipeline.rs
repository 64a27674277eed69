use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use uma_advisor::{map_with_vocabulary, MappingError, PriorityStore};
use uma_capture::{ScreenSource, Screenshot};
use uma_data::KnowledgeBase;
use uma_state::{CycleError, Decision, Outcome, Stage};
use uma_vision::{DebugArtifacts, EventNameReader, LocateParams, MarkerLocator, TemplateMatch, TextReader};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::scenario::{Scenario, ScenarioKind};

/// Template id under which the choice marker is registered
pub const CHOICE_TEMPLATE: &str = "event_choice";

/// Runs one screenshot-to-decision cycle at a time.
pub struct DecisionPipeline {
    config: AppConfig,
    scenario: Scenario,
    locator: MarkerLocator,
    reader: Arc<dyn TextReader>,
    knowledge: Arc<KnowledgeBase>,
    priorities: Arc<PriorityStore>,
    clock: Arc<dyn Clock>,
    artifacts: DebugArtifacts,
}

impl DecisionPipeline {
    pub fn new(
        config: AppConfig,
        locator: MarkerLocator,
        reader: Arc<dyn TextReader>,
        knowledge: Arc<KnowledgeBase>,
        priorities: Arc<PriorityStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scenario = Scenario::new(
            ScenarioKind::from_name(&config.scenario),
            &config.event_overrides,
        );
        let artifacts = DebugArtifacts::new(config.debug_dir.clone(), config.save_debug_images);
        Self {
            config,
            scenario,
            locator,
            reader,
            knowledge,
            priorities,
            clock,
            artifacts,
        }
    }

    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let locator = load_marker(&config.marker_template, config.dedup_radius)?;
        let knowledge = KnowledgeBase::load(&config.data_dir)?
            .with_min_substring_len(config.min_substring_len);
        let priorities = PriorityStore::open(&config.priority_path)?;
        let reader = EventNameReader::new().with_min_word_confidence(config.ocr_min_word_confidence);
        info!(
            "Pipeline ready: {} events, OCR {}",
            knowledge.event_count(),
            if reader.is_available() {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Self::new(
            config,
            locator,
            Arc::new(reader),
            Arc::new(knowledge),
            Arc::new(priorities),
            Arc::new(SystemClock::new()),
        ))
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn priorities(&self) -> &PriorityStore {
        &self.priorities
    }

    fn detect_params(&self) -> LocateParams {
        LocateParams {
            region: self.config.choice_region,
            confidence_threshold: self.config.detect_confidence,
            brightness_threshold: 0.0,
        }
    }

    fn recheck_params(&self) -> LocateParams {
        LocateParams {
            region: self.config.choice_region,
            confidence_threshold: self.config.choice_confidence,
            brightness_threshold: self.config.brightness_threshold,
        }
    }

    fn locate(&self, screenshot: &Screenshot, params: &LocateParams) -> Vec<TemplateMatch> {
        self.scenario
            .locate_choices(&self.locator, screenshot, CHOICE_TEMPLATE, params)
    }

    /// Run one full cycle against `source`, which is captured twice: once for
    /// the existence check and once after the stabilization wait.
    pub fn run_cycle(&self, source: &mut dyn ScreenSource) -> Outcome {
        let outcome = self.cycle(source);
        match &outcome {
            Outcome::Idle => debug!("Cycle finished: idle"),
            Outcome::Done(d) => info!("Cycle finished: choice {} ({})", d.chosen_ordinal, d.rationale),
            Outcome::Fallback { decision, reason } => {
                info!("Cycle finished: fallback to choice {} ({})", decision.chosen_ordinal, reason)
            }
            Outcome::NoOp { rationale } => info!("Cycle finished: no action ({})", rationale),
            Outcome::Abort { rationale } => warn!("Cycle finished: abort ({})", rationale),
        }
        outcome
    }

    fn cycle(&self, source: &mut dyn ScreenSource) -> Outcome {
        let priorities = self.priorities.snapshot();
        enter(Stage::Idle);
        let first = match source.capture() {
            Ok(shot) => shot,
            Err(e) => return capture_failed(&e),
        };
        if self.locate(&first, &self.detect_params()).is_empty() {
            debug!("{}", CycleError::PerceptionMiss);
            return Outcome::Idle;
        }

        enter(Stage::Detected);
        info!("Event detected, scanning");

        enter(Stage::Stabilizing);
        if self
            .clock
            .sleep(Duration::from_millis(self.config.stabilize_ms))
            .is_err()
        {
            return Outcome::NoOp {
                rationale: "stabilization interrupted".into(),
            };
        }
        let shot = match source.capture() {
            Ok(shot) => shot,
            Err(e) => return capture_failed(&e),
        };
        let markers = self.locate(&shot, &self.recheck_params());
        debug!("Recheck choices after delay: {}", markers.len());
        if markers.is_empty() {
            enter(Stage::Fallback);
            info!("Event choices not visible after delay, skipping analysis");
            return Outcome::NoOp {
                rationale: "no choices".into(),
            };
        }

        enter(Stage::Extracting);
        let (text, crop) =
            self.scenario
                .read_event_name(self.reader.as_ref(), &shot, &self.config.event_name_region);
        if text.is_failure() {
            let err = CycleError::ExtractionFailure;
            warn!("{}", err);
            match self
                .artifacts
                .save_failure("event_name", &crop, shot.captured_at_ms)
            {
                Ok(Some(path)) => info!("Saved failed event name crop to {}", path.display()),
                Ok(None) => {}
                Err(e) => warn!("Could not save debug image: {:#}", e),
            }
            if self.config.abort_on_extraction_failure {
                return Outcome::Abort {
                    rationale: err.to_string(),
                };
            }
            return fallback(markers, &err);
        }
        let text = text.as_str();
        info!("Event found: {}", text);

        if let Some(ordinal) = self.scenario.override_for(text) {
            enter(Stage::Mapped);
            info!("Override for '{}': choice {}", text, ordinal);
            if ordinal > markers.len() {
                let err = CycleError::MappingOutOfRange {
                    ordinal,
                    detected: markers.len(),
                };
                error!("{}", err);
                return fallback(markers, &err);
            }
            return done(
                ordinal,
                markers,
                format!("Fixed choice for '{}'", text),
            );
        }

        enter(Stage::Matching);
        let Some((tier, hits)) = self.knowledge.lookup(text) else {
            let err = CycleError::LookupMiss {
                text: text.to_string(),
            };
            warn!("{} ({} choices on screen)", err, markers.len());
            return fallback(markers, &err);
        };
        let Some(record) = hits.first().copied() else {
            let err = CycleError::LookupMiss {
                text: text.to_string(),
            };
            warn!("{}", err);
            return fallback(markers, &err);
        };
        info!("Matched '{}' ({:?}), source: {}", record.name, tier, record.source_label());
        if record.options.is_empty() {
            let err = CycleError::NoOptions {
                name: record.name.clone(),
            };
            warn!("{}", err);
            return fallback(markers, &err);
        }

        enter(Stage::Resolving);
        let (tagged, resolution) = uma_advisor::analyze(record, &priorities);
        let Some(resolution) = resolution else {
            let err = CycleError::NoOptions {
                name: record.name.clone(),
            };
            warn!("{}", err);
            return fallback(markers, &err);
        };
        for (option, tags) in record.options.iter().zip(&tagged) {
            let mut indicators = Vec::new();
            if tags.has_good() {
                indicators.push("Good");
            }
            if tags.has_bad() {
                indicators.push("Bad");
            }
            if option.label == resolution.label {
                indicators.push("RECOMMENDED");
            }
            let suffix = if indicators.is_empty() {
                String::new()
            } else {
                format!(" [{}]", indicators.join(", "))
            };
            info!("  {}: {}{}", option.label, option.rewards_inline(), suffix);
        }
        info!("Recommend: {}", resolution.label);

        enter(Stage::Mapped);
        match map_with_vocabulary(&resolution.label, record.options.len(), markers.len()) {
            Ok(ordinal) => done(ordinal, markers, resolution.rationale),
            Err(MappingError::OutOfRange { ordinal, detected }) => {
                let err = CycleError::MappingOutOfRange { ordinal, detected };
                error!("{}", err);
                fallback(markers, &err)
            }
            Err(MappingError::UnrecognizedLabel { label, .. }) => {
                let err = CycleError::UnrecognizedLabel {
                    label,
                    detected: markers.len(),
                };
                warn!("{}", err);
                fallback(markers, &err)
            }
        }
    }
}

/// Load the choice marker image as the locator's only template.
pub fn load_marker(path: &Path, dedup_radius: f64) -> Result<MarkerLocator> {
    let gray = image::open(path)
        .with_context(|| format!("Failed to load marker template {}", path.display()))?
        .to_luma8();
    let mut locator = MarkerLocator::new().with_dedup_radius(dedup_radius);
    locator.insert(CHOICE_TEMPLATE, &gray);
    Ok(locator)
}

fn enter(stage: Stage) {
    debug!("Stage -> {}", stage.as_str());
}

fn capture_failed(e: &anyhow::Error) -> Outcome {
    let err = CycleError::Capture(format!("{:#}", e));
    warn!("{}", err);
    Outcome::NoOp {
        rationale: err.to_string(),
    }
}

fn done(ordinal: usize, markers: Vec<TemplateMatch>, rationale: String) -> Outcome {
    enter(Stage::Done);
    info!("Choose choice: {}", ordinal);
    Outcome::Done(Decision {
        chosen_ordinal: ordinal,
        confident: true,
        rationale,
        markers,
    })
}

/// Top choice, keeping the detected markers so the actuator can still tap.
fn fallback(markers: Vec<TemplateMatch>, err: &CycleError) -> Outcome {
    enter(Stage::Fallback);
    if markers.is_empty() {
        return Outcome::NoOp {
            rationale: err.to_string(),
        };
    }
    Outcome::Fallback {
        decision: Decision {
            chosen_ordinal: 1,
            confident: false,
            rationale: err.to_string(),
            markers,
        },
        reason: err.to_string(),
    }
}
