//! Manual document model

use serde::{Deserialize, Serialize};

use super::error::InvariantViolation;
use super::steps::StepRepository;

/// Maximum number of images attached to a single step
pub const MAX_IMAGES_PER_STEP: usize = 5;

/// Content language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ar,
    En,
}

impl Lang {
    /// Text direction used when rendering this language
    pub fn dir(self) -> &'static str {
        match self {
            Lang::Ar => "rtl",
            Lang::En => "ltr",
        }
    }
}

impl std::str::FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" => Ok(Lang::Ar),
            "en" => Ok(Lang::En),
            other => Err(format!("unknown language: {}", other)),
        }
    }
}

/// A pair of Arabic and English texts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    pub ar: String,
    pub en: String,
}

impl Bilingual {
    pub fn new(ar: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            ar: ar.into(),
            en: en.into(),
        }
    }

    /// Text in the requested language
    pub fn get(&self, lang: Lang) -> &str {
        match lang {
            Lang::Ar => &self.ar,
            Lang::En => &self.en,
        }
    }

    /// Replace the text in one language
    pub fn set(&mut self, lang: Lang, text: impl Into<String>) {
        match lang {
            Lang::Ar => self.ar = text.into(),
            Lang::En => self.en = text.into(),
        }
    }

    /// Languages whose text is blank
    pub fn missing(&self) -> Vec<Lang> {
        [Lang::Ar, Lang::En]
            .into_iter()
            .filter(|lang| self.get(*lang).trim().is_empty())
            .collect()
    }

    /// Both languages have non-blank text
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Audience category a step can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeneficiaryType {
    Individual,
    Business,
    GovernmentEntity,
}

impl std::str::FromStr for BeneficiaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "INDIVIDUAL" => Ok(BeneficiaryType::Individual),
            "BUSINESS" => Ok(BeneficiaryType::Business),
            "GOVERNMENT_ENTITY" | "GOVERNMENT" => Ok(BeneficiaryType::GovernmentEntity),
            other => Err(format!("unknown beneficiary type: {}", other)),
        }
    }
}

/// Whether a step applies to every audience or to one beneficiary type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepScope {
    Shared,
    Beneficiary,
}

/// Identifies one partition of the step collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub scope: StepScope,
    pub beneficiary_type: Option<BeneficiaryType>,
}

impl PartitionKey {
    /// Build a key, rejecting scope/beneficiary combinations that cannot exist
    pub fn new(
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
    ) -> Result<Self, InvariantViolation> {
        match (scope, beneficiary_type) {
            (StepScope::Beneficiary, None) => Err(InvariantViolation::MissingBeneficiaryType),
            (StepScope::Shared, Some(_)) => Err(InvariantViolation::UnexpectedBeneficiaryType),
            _ => Ok(Self {
                scope,
                beneficiary_type,
            }),
        }
    }

    pub fn shared() -> Self {
        Self {
            scope: StepScope::Shared,
            beneficiary_type: None,
        }
    }

    pub fn beneficiary(beneficiary_type: BeneficiaryType) -> Self {
        Self {
            scope: StepScope::Beneficiary,
            beneficiary_type: Some(beneficiary_type),
        }
    }
}

/// Publication state of a manual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualStatus {
    #[default]
    Draft,
    Review,
    Published,
}

/// Where an image's binary lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    /// Admitted locally, not yet uploaded
    Pending {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    /// Uploaded and addressable
    Url { url: String },
}

/// A captioned image attached to a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepImage {
    pub id: String,
    pub source: ImageRef,
    #[serde(default)]
    pub alt: Bilingual,
}

/// One instructional unit of a manual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub scope: StepScope,
    pub beneficiary_type: Option<BeneficiaryType>,
    #[serde(default)]
    pub title: Bilingual,
    #[serde(default)]
    pub body: Bilingual,
    pub order_index: u32,
    #[serde(default)]
    pub images: Vec<StepImage>,
}

impl Step {
    /// Partition this step belongs to
    pub fn partition(&self) -> PartitionKey {
        PartitionKey {
            scope: self.scope,
            beneficiary_type: self.beneficiary_type,
        }
    }

    /// Check the structural rules a step must always satisfy
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        PartitionKey::new(self.scope, self.beneficiary_type)?;
        if self.images.len() > MAX_IMAGES_PER_STEP {
            return Err(InvariantViolation::TooManyImages {
                count: self.images.len(),
                max: MAX_IMAGES_PER_STEP,
            });
        }
        Ok(())
    }
}

/// The bilingual manual being authored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDocument {
    /// Assigned by the server on first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Bilingual,
    #[serde(default)]
    pub overview: Bilingual,
    /// Selected audiences, in selection order
    #[serde(default)]
    pub selected_beneficiaries: Vec<BeneficiaryType>,
    #[serde(default)]
    pub steps: StepRepository,
    #[serde(default)]
    pub status: ManualStatus,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ManualDocument {
    fn default() -> Self {
        Self {
            id: None,
            title: Bilingual::default(),
            overview: Bilingual::default(),
            selected_beneficiaries: Vec::new(),
            steps: StepRepository::default(),
            status: ManualStatus::Draft,
            version: default_version(),
        }
    }
}

impl ManualDocument {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove a beneficiary from the selection; returns whether it is now selected
    pub fn toggle_beneficiary(&mut self, beneficiary: BeneficiaryType) -> bool {
        if let Some(pos) = self
            .selected_beneficiaries
            .iter()
            .position(|b| *b == beneficiary)
        {
            self.selected_beneficiaries.remove(pos);
            false
        } else {
            self.selected_beneficiaries.push(beneficiary);
            true
        }
    }

    /// Replace the selection, dropping duplicates while keeping first occurrence order
    pub fn set_beneficiaries(&mut self, beneficiaries: impl IntoIterator<Item = BeneficiaryType>) {
        let mut selected = Vec::new();
        for beneficiary in beneficiaries {
            if !selected.contains(&beneficiary) {
                selected.push(beneficiary);
            }
        }
        self.selected_beneficiaries = selected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_rejects_mismatched_scope() {
        assert_eq!(
            PartitionKey::new(StepScope::Beneficiary, None),
            Err(InvariantViolation::MissingBeneficiaryType)
        );
        assert_eq!(
            PartitionKey::new(StepScope::Shared, Some(BeneficiaryType::Business)),
            Err(InvariantViolation::UnexpectedBeneficiaryType)
        );
        assert!(PartitionKey::new(StepScope::Shared, None).is_ok());
    }

    #[test]
    fn test_bilingual_missing_ignores_whitespace() {
        let text = Bilingual::new("  ", "Apply online");
        assert_eq!(text.missing(), vec![Lang::Ar]);
        assert!(!text.is_complete());
        assert_eq!(text.get(Lang::En), "Apply online");
    }

    #[test]
    fn test_toggle_beneficiary_keeps_selection_order() {
        let mut doc = ManualDocument::new();
        doc.toggle_beneficiary(BeneficiaryType::Business);
        doc.toggle_beneficiary(BeneficiaryType::Individual);
        assert_eq!(
            doc.selected_beneficiaries,
            vec![BeneficiaryType::Business, BeneficiaryType::Individual]
        );
        assert!(!doc.toggle_beneficiary(BeneficiaryType::Business));
        assert_eq!(doc.selected_beneficiaries, vec![BeneficiaryType::Individual]);
    }

    #[test]
    fn test_document_wire_format() {
        let mut doc = ManualDocument::new();
        doc.title = Bilingual::new("دليل", "Guide");
        doc.set_beneficiaries([BeneficiaryType::GovernmentEntity]);
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json.get("id").is_none());
        assert_eq!(json["title"]["en"], "Guide");
        assert_eq!(json["selectedBeneficiaries"][0], "GOVERNMENT_ENTITY");
        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["version"], "1.0");
    }
}
