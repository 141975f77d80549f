//! Editing session state and coordination
//!
//! [`ManualEditor`] owns the in-progress manual and is the only way to change
//! it. Every change to the title, overview, beneficiary selection or steps of
//! a never-saved manual schedules a debounced draft write; manuals that
//! already have a server id are never written to the draft slot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::api::{ApiError, ManualApi};
use crate::core::config::EditorConfig;
use crate::core::document::{
    BeneficiaryType, Bilingual, ImageRef, Lang, ManualDocument, PartitionKey, Step, StepScope,
};
use crate::core::draft::{load_draft, DraftAutosave, DraftStore};
use crate::core::error::{EditorError, ValidationError};
use crate::core::events::EditorEvent;
use crate::core::images::{validate_batch, ImageBatch, ImageCandidate};
use crate::core::steps::{MoveDirection, StepPatch};
use crate::preview::{self, Preview};

/// Whether a remote save is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
}

/// Snapshot handed to the remote API by [`ManualEditor::begin_save`]
#[derive(Debug, Clone)]
pub struct PendingSave {
    snapshot: ManualDocument,
}

impl PendingSave {
    pub fn snapshot(&self) -> &ManualDocument {
        &self.snapshot
    }

    /// Send the snapshot: create when it has no id, update otherwise
    pub async fn submit(
        &self,
        api: &dyn ManualApi,
    ) -> Result<ManualDocument, ApiError> {
        match &self.snapshot.id {
            Some(id) => api.update_manual(id, &self.snapshot).await,
            None => api.create_manual(&self.snapshot).await,
        }
    }
}

/// The document editor controller
pub struct ManualEditor {
    document: ManualDocument,
    /// Present only while the manual has never been saved remotely
    autosave: Option<DraftAutosave>,
    drafts: Arc<dyn DraftStore>,
    autosave_delay: Duration,
    save_state: SaveState,
    ui_lang: Lang,
    preview_lang: Lang,
    events: UnboundedSender<EditorEvent>,
}

impl std::fmt::Debug for ManualEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualEditor")
            .field("document", &self.document)
            .field("autosave", &self.autosave)
            .field("save_state", &self.save_state)
            .field("ui_lang", &self.ui_lang)
            .field("preview_lang", &self.preview_lang)
            .finish()
    }
}

impl ManualEditor {
    /// Start editing a new manual, recovering a persisted draft if there is one
    ///
    /// Must be called from within a Tokio runtime. A recovered draft is
    /// announced with [`EditorEvent::DraftLoaded`]; an unreadable one is
    /// dropped and the session starts empty.
    pub fn start_new(
        config: &EditorConfig,
        store: Arc<dyn DraftStore>,
    ) -> (Self, UnboundedReceiver<EditorEvent>) {
        let recovered = load_draft(store.as_ref());
        let mut document = ManualDocument::new();
        let mut updated_at = None;
        if let Some(record) = recovered {
            document = record.document;
            // The slot only ever holds never-saved manuals.
            document.id = None;
            updated_at = Some(record.updated_at);
        }

        let (editor, rx) = Self::open(config, document, store);
        if let Some(updated_at) = updated_at {
            let _ = editor.events.send(EditorEvent::DraftLoaded { updated_at });
        }
        (editor, rx)
    }

    /// Edit a manual as given, without looking at the draft slot
    ///
    /// Autosave runs only while the manual has no server id, so a manual that
    /// already exists remotely never touches `store` until it is discarded.
    pub fn open_existing(
        config: &EditorConfig,
        document: ManualDocument,
        store: Arc<dyn DraftStore>,
    ) -> (Self, UnboundedReceiver<EditorEvent>) {
        Self::open(config, document, store)
    }

    /// Fetch a manual by id and open it
    pub async fn load(
        config: &EditorConfig,
        api: &dyn ManualApi,
        store: Arc<dyn DraftStore>,
        id: &str,
    ) -> Result<(Self, UnboundedReceiver<EditorEvent>), EditorError> {
        let document = api.fetch_manual(id).await?;
        tracing::info!("Loaded manual {}", id);
        Ok(Self::open_existing(config, document, store))
    }

    fn open(
        config: &EditorConfig,
        document: ManualDocument,
        drafts: Arc<dyn DraftStore>,
    ) -> (Self, UnboundedReceiver<EditorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let mut editor = Self {
            document,
            autosave: None,
            drafts,
            autosave_delay: config.autosave_delay(),
            save_state: SaveState::Idle,
            ui_lang: config.ui_lang,
            preview_lang: config.preview_lang,
            events,
        };
        editor.sync_autosave();
        (editor, rx)
    }

    /// Autosave is on exactly while the manual has no server id
    fn sync_autosave(&mut self) {
        match (self.document.id.is_some(), self.autosave.is_some()) {
            (false, false) => {
                self.autosave = Some(
                    DraftAutosave::new(Arc::clone(&self.drafts), self.autosave_delay)
                        .with_events(self.events.clone()),
                );
            }
            (true, true) => self.autosave = None,
            _ => {}
        }
    }

    pub fn document(&self) -> &ManualDocument {
        &self.document
    }

    pub fn save_state(&self) -> SaveState {
        self.save_state
    }

    pub fn is_autosave_enabled(&self) -> bool {
        self.autosave.is_some()
    }

    /// Whether a draft write is waiting for edits to settle
    pub fn has_pending_draft_write(&self) -> bool {
        self.autosave.as_ref().is_some_and(DraftAutosave::is_pending)
    }

    pub fn ui_lang(&self) -> Lang {
        self.ui_lang
    }

    pub fn set_ui_lang(&mut self, lang: Lang) {
        self.ui_lang = lang;
    }

    pub fn preview_lang(&self) -> Lang {
        self.preview_lang
    }

    pub fn set_preview_lang(&mut self, lang: Lang) {
        self.preview_lang = lang;
    }

    /// Schedule a draft write of the current state
    fn touched(&mut self) {
        if let Some(autosave) = self.autosave.as_mut() {
            autosave.schedule(self.document.clone());
        }
    }

    pub fn set_title(&mut self, lang: Lang, text: impl Into<String>) {
        self.document.title.set(lang, text);
        self.touched();
    }

    pub fn set_overview(&mut self, lang: Lang, text: impl Into<String>) {
        self.document.overview.set(lang, text);
        self.touched();
    }

    /// Add or remove a beneficiary type; returns whether it is now selected
    pub fn toggle_beneficiary(&mut self, beneficiary: BeneficiaryType) -> bool {
        let selected = self.document.toggle_beneficiary(beneficiary);
        self.touched();
        selected
    }

    pub fn set_beneficiaries(&mut self, beneficiaries: impl IntoIterator<Item = BeneficiaryType>) {
        self.document.set_beneficiaries(beneficiaries);
        self.touched();
    }

    pub fn add_step(
        &mut self,
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
    ) -> Result<Step, EditorError> {
        let step = self.document.steps.add_step(scope, beneficiary_type)?;
        self.touched();
        Ok(step)
    }

    pub fn update_step(&mut self, id: &str, patch: StepPatch) -> Result<Step, EditorError> {
        let step = self.document.steps.update_step(id, patch)?.clone();
        self.touched();
        Ok(step)
    }

    pub fn delete_step(&mut self, id: &str) -> Result<Step, EditorError> {
        let step = self.document.steps.delete_step(id)?;
        self.touched();
        Ok(step)
    }

    /// Move a step one place within its partition; `false` when already at the edge
    pub fn move_step(&mut self, id: &str, direction: MoveDirection) -> Result<bool, EditorError> {
        let moved = self.document.steps.move_step(id, direction)?;
        if moved {
            self.touched();
        }
        Ok(moved)
    }

    pub fn reorder_partition(
        &mut self,
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
        ordered_ids: &[String],
    ) -> Result<(), EditorError> {
        self.document
            .steps
            .reorder_partition(scope, beneficiary_type, ordered_ids)?;
        self.touched();
        Ok(())
    }

    /// Steps of one partition in their relative order
    pub fn partition(
        &self,
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
    ) -> Result<Vec<&Step>, EditorError> {
        let key = PartitionKey::new(scope, beneficiary_type)?;
        Ok(self.document.steps.partition(key))
    }

    /// Validate candidate files and attach the admitted ones to a step
    ///
    /// A batch that would exceed the per-step limit is refused as a whole and
    /// leaves the step untouched. Otherwise the returned batch lists both the
    /// admitted images and the files rejected individually.
    pub fn attach_images(
        &mut self,
        step_id: &str,
        candidates: &[ImageCandidate],
    ) -> Result<ImageBatch, EditorError> {
        let existing = self.step(step_id)?.images.len();
        let batch = validate_batch(existing, candidates)?;
        if !batch.admitted.is_empty() {
            let step = self.step_mut(step_id)?;
            step.images.extend(batch.admitted.iter().cloned());
            self.touched();
        }
        Ok(batch)
    }

    pub fn remove_image(&mut self, step_id: &str, image_id: &str) -> Result<(), EditorError> {
        let step = self.step_mut(step_id)?;
        let before = step.images.len();
        step.images.retain(|img| img.id != image_id);
        if step.images.len() == before {
            return Err(image_not_found(step_id, image_id));
        }
        self.touched();
        Ok(())
    }

    pub fn set_image_alt(
        &mut self,
        step_id: &str,
        image_id: &str,
        alt: Bilingual,
    ) -> Result<(), EditorError> {
        let step = self.step_mut(step_id)?;
        let image = step
            .images
            .iter_mut()
            .find(|img| img.id == image_id)
            .ok_or_else(|| image_not_found(step_id, image_id))?;
        image.alt = alt;
        self.touched();
        Ok(())
    }

    /// Record the URL the upload service assigned to a pending image
    pub fn resolve_image(
        &mut self,
        step_id: &str,
        image_id: &str,
        url: impl Into<String>,
    ) -> Result<(), EditorError> {
        let step = self.step_mut(step_id)?;
        let image = step
            .images
            .iter_mut()
            .find(|img| img.id == image_id)
            .ok_or_else(|| image_not_found(step_id, image_id))?;
        image.source = ImageRef::Url { url: url.into() };
        self.touched();
        Ok(())
    }

    fn step(&self, id: &str) -> Result<&Step, EditorError> {
        self.document
            .steps
            .get(id)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))
    }

    fn step_mut(&mut self, id: &str) -> Result<&mut Step, EditorError> {
        self.document
            .steps
            .get_mut(id)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))
    }

    /// Preview the document for its selected beneficiaries in the preview language
    pub fn preview(&self) -> Preview {
        self.preview_in(self.preview_lang)
    }

    pub fn preview_in(&self, lang: Lang) -> Preview {
        preview::compose(&self.document, &self.document.selected_beneficiaries, lang)
    }

    /// Validate and enter the saving state
    pub fn begin_save(&mut self) -> Result<PendingSave, EditorError> {
        if self.save_state == SaveState::Saving {
            return Err(EditorError::SaveInProgress);
        }
        let errors = self.validate_for_save();
        if !errors.is_empty() {
            return Err(EditorError::Invalid(errors));
        }
        self.save_state = SaveState::Saving;
        Ok(PendingSave {
            snapshot: self.document.clone(),
        })
    }

    /// Leave the saving state and apply the outcome
    ///
    /// On success the manual adopts the server id and the draft is deleted;
    /// edits made while the save was in flight are kept. On failure the
    /// document is left exactly as it was. A success that carries no id for
    /// a manual that had none is treated as a failure.
    pub fn finish_save(
        &mut self,
        outcome: Result<ManualDocument, ApiError>,
    ) -> Result<String, EditorError> {
        self.save_state = SaveState::Idle;
        let outcome = outcome.and_then(|saved| {
            saved
                .id
                .filter(|id| !id.is_empty())
                .or_else(|| self.document.id.clone())
                .ok_or_else(|| ApiError::Rejected("saved manual has no id".to_string()))
        });
        match outcome {
            Ok(id) => {
                self.document.id = Some(id.clone());
                if let Some(mut autosave) = self.autosave.take() {
                    if let Err(e) = autosave.discard() {
                        tracing::warn!("Failed to delete draft after save: {}", e);
                    }
                }
                tracing::info!("Saved manual {}", id);
                let _ = self.events.send(EditorEvent::SaveSucceeded { id: id.clone() });
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("Failed to save manual: {}", e);
                let _ = self.events.send(EditorEvent::SaveFailed {
                    message: e.to_string(),
                });
                Err(EditorError::Transient(e))
            }
        }
    }

    /// Give up on a save started with [`begin_save`](Self::begin_save)
    ///
    /// For hosts that drop the [`PendingSave`] without an outcome; the
    /// document is left untouched.
    pub fn abandon_save(&mut self) {
        if self.save_state == SaveState::Saving {
            tracing::warn!("Save abandoned before completion");
            self.save_state = SaveState::Idle;
        }
    }

    /// Validate, send and apply a save in one go
    ///
    /// Dropping the returned future before it completes leaves the editor idle.
    pub async fn save(&mut self, api: &dyn ManualApi) -> Result<String, EditorError> {
        let pending = self.begin_save()?;
        let guard = SaveGuard { editor: self };
        let outcome = pending.submit(api).await;
        guard.finish(outcome)
    }

    /// Throw away the manual and its draft, starting over empty
    pub fn discard(&mut self) {
        if let Some(autosave) = self.autosave.as_mut() {
            if let Err(e) = autosave.discard() {
                tracing::warn!("Failed to delete draft: {}", e);
            }
        }
        self.document = ManualDocument::new();
        self.sync_autosave();
        tracing::info!("Discarded manual");
    }

    /// Everything that must be fixed before the manual can be saved
    pub fn validate_for_save(&self) -> Vec<ValidationError> {
        validate_for_save(&self.document)
    }
}

/// Resets the editor to idle if a save is dropped mid-flight
struct SaveGuard<'a> {
    editor: &'a mut ManualEditor,
}

impl SaveGuard<'_> {
    fn finish(self, outcome: Result<ManualDocument, ApiError>) -> Result<String, EditorError> {
        self.editor.finish_save(outcome)
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.editor.abandon_save();
    }
}

/// Everything that must be fixed before `document` can be saved
pub fn validate_for_save(document: &ManualDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for lang in document.title.missing() {
        errors.push(required(format!("title.{}", lang_code(lang))));
    }
    for step in document.steps.iter() {
        for lang in step.title.missing() {
            errors.push(required(format!("steps[{}].title.{}", step.id, lang_code(lang))));
        }
        for image in &step.images {
            if !image.alt.is_complete() {
                errors.push(ValidationError::MissingAltText {
                    step_id: step.id.clone(),
                    image_id: image.id.clone(),
                });
            }
        }
    }
    errors
}

fn required(field: String) -> ValidationError {
    ValidationError::Required { field }
}

fn lang_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Ar => "ar",
        Lang::En => "en",
    }
}

fn image_not_found(step_id: &str, image_id: &str) -> EditorError {
    EditorError::ImageNotFound {
        step_id: step_id.to_string(),
        image_id: image_id.to_string(),
    }
}
