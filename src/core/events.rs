//! Notifications emitted by the editor to its host

use chrono::{DateTime, Utc};

/// Something the host UI should tell the author about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A recovered draft became the initial state
    DraftLoaded { updated_at: DateTime<Utc> },
    /// The debounced draft write completed
    DraftPersisted { updated_at: DateTime<Utc> },
    /// The remote save finished and the manual has this id
    SaveSucceeded { id: String },
    /// The remote save failed; the document is unchanged and can be saved again
    SaveFailed { message: String },
}
