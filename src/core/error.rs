//! Error types shared by the editing engine

use thiserror::Error;

use super::api::ApiError;

/// A user-correctable problem, reported inline at the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must not exceed {max} characters")]
    TooLong { field: String, max: usize },

    #[error("service code {code:?} must be 3-20 uppercase letters, digits or hyphens")]
    InvalidServiceCode { code: String },

    #[error("a step holds at most {max} images ({existing} attached, {incoming} submitted)")]
    TooManyImages {
        existing: usize,
        incoming: usize,
        max: usize,
    },

    #[error("{file_name}: unsupported file type {mime_type:?}, use PNG or JPG")]
    InvalidFileType { file_name: String, mime_type: String },

    #[error("{file_name}: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },

    #[error("image {image_id} on step {step_id} needs alt text in both languages")]
    MissingAltText { step_id: String, image_id: String },
}

impl ValidationError {
    /// Field path the error should be displayed next to
    pub fn field(&self) -> String {
        match self {
            Self::Required { field } | Self::TooLong { field, .. } => field.clone(),
            Self::InvalidServiceCode { .. } => "code".to_string(),
            Self::TooManyImages { .. } => "images".to_string(),
            Self::InvalidFileType { file_name, .. } | Self::FileTooLarge { file_name, .. } => {
                format!("images[{}]", file_name)
            }
            Self::MissingAltText { step_id, image_id } => {
                format!("steps[{}].images[{}].alt", step_id, image_id)
            }
        }
    }
}

/// Structural rule broken by a requested operation; nothing was applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("beneficiary-scoped steps need a beneficiary type")]
    MissingBeneficiaryType,

    #[error("shared steps cannot carry a beneficiary type")]
    UnexpectedBeneficiaryType,

    #[error("{0} cannot be changed after the step is created")]
    ImmutableField(&'static str),

    #[error("a step holds at most {max} images, got {count}")]
    TooManyImages { count: usize, max: usize },

    #[error("reorder list is not a permutation of the partition")]
    NotAPermutation,
}

/// Errors returned by editor operations
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("{} validation error(s): {}", .0.len(), join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvariantViolation),

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("image {image_id} not found on step {step_id}")]
    ImageNotFound { step_id: String, image_id: String },

    #[error("a save is already in progress")]
    SaveInProgress,

    /// Network or API failure; the in-memory document is untouched and the
    /// operation can be retried
    #[error("transient failure: {0}")]
    Transient(#[from] ApiError),
}

impl EditorError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ValidationError> for EditorError {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(vec![err])
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
