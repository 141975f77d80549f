//! Remote collaborator API consumed by the editor
//!
//! Transport is out of scope here: [`ManualApi`] describes the endpoints the
//! editor needs, and hosts plug in an HTTP client. [`MemoryManualApi`] keeps
//! everything in memory and can be told to fail, which is what tests and
//! offline demos use.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::document::{Bilingual, ManualDocument, ManualStatus};
use super::service::{NewService, Service};

/// Failures talking to the remote API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// Login request body for `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Bearer token attached to subsequent calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
}

/// One row of `GET /manuals`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSummary {
    pub id: String,
    pub title: Bilingual,
    pub status: ManualStatus,
    pub version: String,
}

impl From<&ManualDocument> for ManualSummary {
    fn from(doc: &ManualDocument) -> Self {
        Self {
            id: doc.id.clone().unwrap_or_default(),
            title: doc.title.clone(),
            status: doc.status,
            version: doc.version.clone(),
        }
    }
}

/// Endpoints of the manuals backend
#[async_trait]
pub trait ManualApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError>;

    /// `GET /manuals`
    async fn list_manuals(&self) -> Result<Vec<ManualSummary>, ApiError>;

    /// `GET /manuals/:id`
    async fn fetch_manual(&self, id: &str) -> Result<ManualDocument, ApiError>;

    /// `POST /manuals`; the returned document carries the assigned id
    async fn create_manual(&self, manual: &ManualDocument) -> Result<ManualDocument, ApiError>;

    /// `PUT /manuals/:id`
    async fn update_manual(
        &self,
        id: &str,
        manual: &ManualDocument,
    ) -> Result<ManualDocument, ApiError>;

    /// `GET /services`
    async fn list_services(&self) -> Result<Vec<Service>, ApiError>;

    /// `POST /services`
    async fn create_service(&self, service: &NewService) -> Result<Service, ApiError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    manuals: BTreeMap<String, ManualDocument>,
    services: Vec<Service>,
    fail_next: Option<ApiError>,
    latency: Duration,
    calls: usize,
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryManualApi {
    state: Mutex<MemoryState>,
}

impl MemoryManualApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.lock().fail_next = Some(error);
    }

    /// Delay every manual create and update by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Number of calls received, failed ones included
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Stored copy of a manual
    pub fn manual(&self, id: &str) -> Option<ManualDocument> {
        self.lock().manuals.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn stall(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Count the call and apply any injected failure
    fn begin(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, ApiError> {
        let mut state = self.lock();
        state.calls += 1;
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl ManualApi for MemoryManualApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        self.begin()?;
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(AuthToken {
            access_token: Uuid::new_v4().to_string(),
        })
    }

    async fn list_manuals(&self) -> Result<Vec<ManualSummary>, ApiError> {
        let state = self.begin()?;
        Ok(state.manuals.values().map(ManualSummary::from).collect())
    }

    async fn fetch_manual(&self, id: &str) -> Result<ManualDocument, ApiError> {
        let state = self.begin()?;
        state
            .manuals
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/manuals/{}", id)))
    }

    async fn create_manual(&self, manual: &ManualDocument) -> Result<ManualDocument, ApiError> {
        self.stall().await;
        let mut state = self.begin()?;
        let mut stored = manual.clone();
        let id = Uuid::new_v4().to_string();
        stored.id = Some(id.clone());
        state.manuals.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_manual(
        &self,
        id: &str,
        manual: &ManualDocument,
    ) -> Result<ManualDocument, ApiError> {
        self.stall().await;
        let mut state = self.begin()?;
        let slot = state
            .manuals
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("/manuals/{}", id)))?;
        let mut stored = manual.clone();
        stored.id = Some(id.to_string());
        *slot = stored.clone();
        Ok(stored)
    }

    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        let state = self.begin()?;
        Ok(state.services.clone())
    }

    async fn create_service(&self, service: &NewService) -> Result<Service, ApiError> {
        let mut state = self.begin()?;
        let service = service.normalized();
        if state.services.iter().any(|s| s.code == service.code) {
            return Err(ApiError::Rejected(format!(
                "service code {} already exists",
                service.code
            )));
        }
        let created = Service {
            id: Uuid::new_v4().to_string(),
            code: service.code,
            name: service.name,
            created_at: Utc::now(),
        };
        state.services.push(created.clone());
        Ok(created)
    }
}
