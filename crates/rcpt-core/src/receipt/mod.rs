//! Receipt line-item extraction: pattern library, stage cascade, validation
//! and diagnostics.

pub mod coordinator;
pub mod diagnostics;
pub mod fields;
pub mod library;
pub mod patterns;
pub mod pipeline;
pub mod stages;
pub mod validator;

pub use coordinator::{
    AttemptOutcome, Coordination, LineResolution, LineState, StageAttempt, StageCoordinator,
};
pub use diagnostics::{DebugReporter, DiagnosticReport};
pub use library::{
    ConfidenceClass, Pattern, PatternDefinition, PatternField, PatternLibrary, category_for,
};
pub use pipeline::{ExtractOptions, ReceiptPipeline};
pub use stages::{FlexibleStage, HeuristicStage, StageMatcher, StrictStage};
pub use validator::ResultValidator;
