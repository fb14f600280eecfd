#![forbid(unsafe_code)]

use crate::model::{Link, ParentId};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network failure calling {target}: {message}")]
    Network { target: String, message: String },
    #[error("{target} answered with HTTP {code}")]
    Status { target: String, code: u16 },
    #[error("could not decode response from {target}: {message}")]
    Decode { target: String, message: String },
}

impl TransportError {
    /// HTTP status to report in dependency telemetry.
    pub fn response_code(&self) -> u16 {
        match self {
            Self::Status { code, .. } => *code,
            _ => 500,
        }
    }
}

/// CRUD against the link service. One round trip per call, no caching.
pub trait LinkGateway: Send + Sync {
    fn fetch_links(&self, parent_id: ParentId) -> Result<Vec<Link>, TransportError>;
    fn save_link(&self, link: &Link) -> Result<(), TransportError>;
    fn delete_link(&self, parent_id: ParentId, path: &str) -> Result<(), TransportError>;
}

impl<T: LinkGateway + ?Sized> LinkGateway for Arc<T> {
    fn fetch_links(&self, parent_id: ParentId) -> Result<Vec<Link>, TransportError> {
        (**self).fetch_links(parent_id)
    }

    fn save_link(&self, link: &Link) -> Result<(), TransportError> {
        (**self).save_link(link)
    }

    fn delete_link(&self, parent_id: ParentId, path: &str) -> Result<(), TransportError> {
        (**self).delete_link(parent_id, path)
    }
}

pub type SavedCallback = Box<dyn Fn(bool) + Send + Sync>;

/// The record that owns the links.
pub trait ParentRecord: Send + Sync {
    fn id(&self) -> ParentId;
    /// `true` while the record has not been persisted yet.
    fn is_new(&self) -> bool;
    /// Registers a callback fired after the record is saved, with the fresh `is_new` value.
    fn subscribe_saved(&self, callback: SavedCallback);
}

pub trait UserIdentity: Send + Sync {
    fn current_user(&self) -> String;
}

/// Identity that always reports the same name.
#[derive(Clone, Debug)]
pub struct FixedUser(pub String);

impl UserIdentity for FixedUser {
    fn current_user(&self) -> String {
        self.0.clone()
    }
}
