pub mod clock;
pub mod config;
pub mod pipeline;
pub mod scenario;

pub use clock::{Clock, Interrupted, ManualClock, SystemClock};
pub use config::AppConfig;
pub use pipeline::{load_marker, DecisionPipeline, CHOICE_TEMPLATE};
pub use scenario::{Capability, Operations, Scenario, ScenarioKind};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "uma_pilot=debug,uma_pilot_lib=debug,uma_vision=debug,uma_data=info,uma_advisor=info"
                    .into()
            }),
        )
        .init();
}
