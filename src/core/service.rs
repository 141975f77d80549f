//! Government service records and their validation

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::document::Bilingual;
use super::error::ValidationError;

/// Longest accepted service name, per language
pub const MAX_SERVICE_NAME_CHARS: usize = 255;

/// A service as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub code: String,
    pub name: Bilingual,
    pub created_at: DateTime<Utc>,
}

/// Fields submitted to create a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub code: String,
    pub name: Bilingual,
}

impl NewService {
    /// Copy with surrounding whitespace trimmed, as submitted to the API
    pub fn normalized(&self) -> Self {
        Self {
            code: self.code.trim().to_string(),
            name: Bilingual::new(self.name.ar.trim(), self.name.en.trim()),
        }
    }
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9-]{3,20}$").expect("valid service code pattern"))
}

/// Check a service code: 3-20 uppercase letters, digits or hyphens
pub fn validate_service_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    if !code_pattern().is_match(code) {
        return Err(ValidationError::InvalidServiceCode {
            code: code.to_string(),
        });
    }
    Ok(())
}

/// Validate every field of a new service, reporting all problems at once
pub fn validate_service(service: &NewService) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(err) = validate_service_code(&service.code) {
        errors.push(err);
    }
    for (field, value) in [("name.ar", &service.name.ar), ("name.en", &service.name.en)] {
        if value.trim().is_empty() {
            errors.push(ValidationError::Required {
                field: field.to_string(),
            });
        } else if value.chars().count() > MAX_SERVICE_NAME_CHARS {
            errors.push(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_SERVICE_NAME_CHARS,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_code_pattern() {
        assert!(validate_service_code("SRV-001").is_ok());
        assert!(matches!(
            validate_service_code("sr1"),
            Err(ValidationError::InvalidServiceCode { .. })
        ));
        assert!(matches!(
            validate_service_code("AB"),
            Err(ValidationError::InvalidServiceCode { .. })
        ));
        assert!(matches!(
            validate_service_code("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_service_code("A-1234567890123456789").is_err());
    }

    #[test]
    fn test_validate_service_reports_every_field() {
        let service = NewService {
            code: "x".into(),
            name: Bilingual::new("", "n".repeat(256)),
        };
        let errors = validate_service(&service).unwrap_err();
        let fields: Vec<String> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, vec!["code", "name.ar", "name.en"]);
        assert!(matches!(errors[2], ValidationError::TooLong { max: 255, .. }));
    }

    #[test]
    fn test_name_length_counts_characters_not_bytes() {
        let service = NewService {
            code: "SRV-002".into(),
            name: Bilingual::new("خ".repeat(255), "Passport"),
        };
        assert!(validate_service(&service).is_ok());
    }
}
