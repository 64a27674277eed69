mod debug_artifacts;
mod marker_locator;
mod text_reader;

pub use debug_artifacts::DebugArtifacts;
pub use marker_locator::{LocateParams, MarkerLocator, DEFAULT_DEDUP_RADIUS};
pub use text_reader::{
    extract_text, preprocess_for_ocr, stretch_contrast, EventNameReader, RecognizedText,
    TextReader, DEFAULT_MIN_WORD_CONFIDENCE,
};
pub use uma_state::TemplateMatch;
