//! Validation of candidate image files before they become step images

use uuid::Uuid;

use super::document::{Bilingual, ImageRef, StepImage, MAX_IMAGES_PER_STEP};
use super::error::ValidationError;

/// Largest accepted image, in bytes (5 MiB)
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Accepted MIME types
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

/// A file the author wants to attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl ImageCandidate {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// Result of validating a batch: admitted images plus per-file rejections
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    pub admitted: Vec<StepImage>,
    pub rejected: Vec<ValidationError>,
}

/// Validate a batch of candidates against a step that already holds
/// `existing` images
///
/// Exceeding the per-step limit rejects the whole batch. Otherwise each file
/// is judged on its own, so one bad file never blocks its siblings.
pub fn validate_batch(
    existing: usize,
    candidates: &[ImageCandidate],
) -> Result<ImageBatch, ValidationError> {
    if existing + candidates.len() > MAX_IMAGES_PER_STEP {
        return Err(ValidationError::TooManyImages {
            existing,
            incoming: candidates.len(),
            max: MAX_IMAGES_PER_STEP,
        });
    }

    let mut batch = ImageBatch::default();
    for candidate in candidates {
        match validate_candidate(candidate) {
            Ok(()) => batch.admitted.push(StepImage {
                id: Uuid::new_v4().to_string(),
                source: ImageRef::Pending {
                    file_name: candidate.file_name.clone(),
                },
                alt: Bilingual::default(),
            }),
            Err(err) => {
                tracing::debug!("Rejected image {}: {}", candidate.file_name, err);
                batch.rejected.push(err);
            }
        }
    }
    Ok(batch)
}

fn validate_candidate(candidate: &ImageCandidate) -> Result<(), ValidationError> {
    let mime = candidate.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(ValidationError::InvalidFileType {
            file_name: candidate.file_name.clone(),
            mime_type: candidate.mime_type.clone(),
        });
    }
    if candidate.size_bytes > MAX_IMAGE_BYTES {
        return Err(ValidationError::FileTooLarge {
            file_name: candidate.file_name.clone(),
            size: candidate.size_bytes,
            max: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}
