#![forbid(unsafe_code)]

pub mod controller;
pub mod gateway;
pub mod model;
pub mod reconcile;
pub mod rows;
pub mod snapshot;
pub mod telemetry;
pub mod wire;

pub use controller::{
    ChangeListener, Collaborators, ControllerError, DeleteOutcome, DeleteStep, PendingDelete,
    PendingSave, RepositoryRef, RowLifecycleController,
};
pub use gateway::{FixedUser, LinkGateway, ParentRecord, SavedCallback, TransportError, UserIdentity};
pub use model::{Link, LinkStatus, ParentId, RepositoryItem};
pub use reconcile::{SortOrder, reconcile, sort_rows};
pub use rows::{
    DELETE_FAILED_MESSAGE, MISSING_FILE_MESSAGE, RowId, RowIdAllocator, RowViewModel,
    SAVE_FAILED_MESSAGE, WebUrlBuilder, encode_uri_component,
};
pub use snapshot::{RepositoryListing, Snapshot, SnapshotError, SnapshotLoader};
pub use telemetry::{DependencyEvent, NoopTelemetry, Severity, Telemetry, TracingTelemetry};
pub use wire::{API_VERSION, LinkPayload, WireError, format_timestamp};
