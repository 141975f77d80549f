//! Per-audience preview of a manual
//!
//! A preview projects the document onto each selected beneficiary type: the
//! shared steps come first, followed by that audience's own steps. All text
//! is taken in the requested preview language, whatever language the
//! authoring interface is using.

pub mod render;

use crate::core::document::{
    BeneficiaryType, ImageRef, Lang, ManualDocument, PartitionKey, Step,
};

/// What the preview pane should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// No beneficiary type is selected
    NothingToPreview { lang: Lang },
    /// Exactly one audience
    Single(AudienceView),
    /// One tab per selected audience, in selection order
    Tabs(Vec<AudienceView>),
}

impl Preview {
    /// All audience views, empty for the placeholder
    pub fn views(&self) -> &[AudienceView] {
        match self {
            Preview::NothingToPreview { .. } => &[],
            Preview::Single(view) => std::slice::from_ref(view),
            Preview::Tabs(views) => views,
        }
    }
}

/// The manual as one audience sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceView {
    pub beneficiary: BeneficiaryType,
    pub lang: Lang,
    pub title: String,
    pub overview: String,
    /// Steps that apply to every audience
    pub shared: Vec<StepView>,
    /// Steps specific to this audience
    pub specific: Vec<StepView>,
}

impl AudienceView {
    /// Shared steps followed by audience-specific steps
    pub fn steps(&self) -> impl Iterator<Item = &StepView> {
        self.shared.iter().chain(self.specific.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.specific.is_empty()
    }
}

/// A step rendered in one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub step_id: String,
    /// 1-based position within its section
    pub number: usize,
    pub title: String,
    pub body: String,
    pub images: Vec<ImageView>,
}

/// An image with its caption in the preview language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub image_id: String,
    /// URL, or `None` while the binary is still pending upload
    pub url: Option<String>,
    pub caption: String,
}

/// Build the preview for the given selection and language
pub fn compose(document: &ManualDocument, selected: &[BeneficiaryType], lang: Lang) -> Preview {
    let mut views: Vec<AudienceView> = Vec::with_capacity(selected.len());
    for beneficiary in selected {
        if views.iter().any(|v| v.beneficiary == *beneficiary) {
            continue;
        }
        views.push(audience_view(document, *beneficiary, lang));
    }

    match views.len() {
        0 => Preview::NothingToPreview { lang },
        1 => Preview::Single(views.remove(0)),
        _ => Preview::Tabs(views),
    }
}

/// Build the view of a single audience
pub fn audience_view(document: &ManualDocument, beneficiary: BeneficiaryType, lang: Lang) -> AudienceView {
    let section = |key: PartitionKey| -> Vec<StepView> {
        document
            .steps
            .partition(key)
            .into_iter()
            .enumerate()
            .map(|(i, step)| step_view(step, i + 1, lang))
            .collect()
    };

    AudienceView {
        beneficiary,
        lang,
        title: document.title.get(lang).to_string(),
        overview: document.overview.get(lang).to_string(),
        shared: section(PartitionKey::shared()),
        specific: section(PartitionKey::beneficiary(beneficiary)),
    }
}

fn step_view(step: &Step, number: usize, lang: Lang) -> StepView {
    StepView {
        step_id: step.id.clone(),
        number,
        title: step.title.get(lang).to_string(),
        body: step.body.get(lang).to_string(),
        images: step
            .images
            .iter()
            .map(|image| ImageView {
                image_id: image.id.clone(),
                url: match &image.source {
                    ImageRef::Url { url } => Some(url.clone()),
                    ImageRef::Pending { .. } => None,
                },
                caption: image.alt.get(lang).to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{Bilingual, StepImage, StepScope};
    use crate::core::steps::{MoveDirection, StepPatch};

    fn add(doc: &mut ManualDocument, beneficiary: Option<BeneficiaryType>, title: &str) -> String {
        let scope = if beneficiary.is_some() {
            StepScope::Beneficiary
        } else {
            StepScope::Shared
        };
        let step = doc.steps.add_step(scope, beneficiary).unwrap();
        doc.steps
            .update_step(
                &step.id,
                StepPatch::title(Bilingual::new(format!("{}-ar", title), title)),
            )
            .unwrap();
        step.id
    }

    fn titles(view: &AudienceView) -> Vec<&str> {
        view.steps().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_no_selection_yields_placeholder() {
        let doc = ManualDocument::new();
        assert_eq!(
            compose(&doc, &[], Lang::En),
            Preview::NothingToPreview { lang: Lang::En }
        );
        assert!(compose(&doc, &[], Lang::En).views().is_empty());
    }

    #[test]
    fn test_shared_steps_precede_beneficiary_steps() {
        let mut doc = ManualDocument::new();
        // Interleave insertion so flat order differs from the view order.
        add(&mut doc, Some(BeneficiaryType::Business), "B1");
        add(&mut doc, None, "S1");
        add(&mut doc, Some(BeneficiaryType::Individual), "I1");
        add(&mut doc, Some(BeneficiaryType::Business), "B2");
        add(&mut doc, None, "S2");

        let Preview::Single(view) = compose(&doc, &[BeneficiaryType::Business], Lang::En) else {
            panic!("expected a single view");
        };
        assert_eq!(titles(&view), vec!["S1", "S2", "B1", "B2"]);
        assert_eq!(view.specific[0].number, 1);
    }

    #[test]
    fn test_multiple_selection_yields_tabs_in_selection_order() {
        let mut doc = ManualDocument::new();
        add(&mut doc, None, "S1");
        add(&mut doc, Some(BeneficiaryType::Individual), "I1");
        add(&mut doc, Some(BeneficiaryType::GovernmentEntity), "G1");

        let selected = [BeneficiaryType::GovernmentEntity, BeneficiaryType::Individual];
        let Preview::Tabs(views) = compose(&doc, &selected, Lang::En) else {
            panic!("expected tabs");
        };
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].beneficiary, BeneficiaryType::GovernmentEntity);
        assert_eq!(titles(&views[0]), vec!["S1", "G1"]);
        assert_eq!(titles(&views[1]), vec!["S1", "I1"]);
    }

    #[test]
    fn test_preview_follows_requested_language_and_order() {
        let mut doc = ManualDocument::new();
        doc.title = Bilingual::new("دليل", "Guide");
        let s1 = add(&mut doc, None, "S1");
        add(&mut doc, None, "S2");
        doc.steps.move_step(&s1, MoveDirection::Down).unwrap();
        let image = StepImage {
            id: "img".into(),
            source: ImageRef::Url {
                url: "https://cdn.example/form.png".into(),
            },
            alt: Bilingual::new("نموذج", "Form"),
        };
        doc.steps
            .update_step(&s1, StepPatch::images(vec![image]))
            .unwrap();

        let view = audience_view(&doc, BeneficiaryType::Business, Lang::Ar);
        assert_eq!(view.title, "دليل");
        assert_eq!(titles(&view), vec!["S2-ar", "S1-ar"]);
        assert_eq!(view.shared[1].number, 2);
        assert_eq!(view.shared[1].images[0].caption, "نموذج");
        assert_eq!(
            view.shared[1].images[0].url.as_deref(),
            Some("https://cdn.example/form.png")
        );
        assert!(view.specific.is_empty());
    }
}
