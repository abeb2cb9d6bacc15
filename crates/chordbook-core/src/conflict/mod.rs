//! Conflict detection, field merging and resolution

mod detector;
mod manager;
mod merge;
mod resolution;

pub use detector::{classify_divergence, detect, Divergence};
pub use manager::{ConflictManager, ReceiveOutcome};
pub use merge::{
    apply_field_choices, apply_field_choices_strict, conflicting_fields, preview_merge,
    FieldChoices, MergePreview,
};
pub use resolution::{
    MergeRequest, Resolution, ResolutionExecutor, ResolutionOutcome, ResolutionStrategy,
};
