#![forbid(unsafe_code)]

//! Client side of the link service: HTTP gateway, repository listing and configuration.

pub mod config;
pub mod git;
pub mod links;
pub mod parent;

pub use config::{ClientConfig, ConfigError, normalize_base_url};
pub use git::GitItemsClient;
pub use links::LinkClient;
pub use parent::ExistingParent;
