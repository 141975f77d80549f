//! Manual Editor - bilingual service manual authoring engine
//!
//! Document model, partition-aware step editing, debounced draft recovery and
//! per-audience preview for Arabic/English government service manuals.

pub mod app;
pub mod core;
pub mod preview;

pub use app::{ManualEditor, PendingSave, SaveState};
pub use crate::core::document::{
    BeneficiaryType, Bilingual, Lang, ManualDocument, ManualStatus, Step, StepImage, StepScope,
};
pub use crate::core::error::{EditorError, InvariantViolation, ValidationError};
pub use crate::core::events::EditorEvent;
