#![forbid(unsafe_code)]

//! JSON shape of a link as exchanged over HTTP.

use crate::model::{Link, LinkStatus, ParentId};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Date-stamped API version understood by the link service.
pub const API_VERSION: &str = "2020-07-15";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("modifiedOn is not an RFC 3339 timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPayload {
    pub work_item_id: ParentId,
    #[serde(default, deserialize_with = "string_or_null")]
    pub path: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub comment: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub created_by: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub modified_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_status: Option<String>,
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

impl From<&Link> for LinkPayload {
    fn from(link: &Link) -> Self {
        Self {
            work_item_id: link.parent_id,
            path: link.path.clone(),
            comment: link.comment.clone(),
            created_by: link.created_by.clone(),
            modified_by: link.modified_by.clone(),
            modified_on: Some(format_timestamp(link.modified_on)),
            link_status: Some(link.status.as_str().to_string()),
        }
    }
}

impl LinkPayload {
    /// Converts to the domain model.
    ///
    /// A missing `modifiedOn` maps to the Unix epoch. `linkStatus` is informational: a missing or
    /// unrecognised value maps to `Ok`.
    pub fn into_link(self) -> Result<Link, WireError> {
        let modified_on = match self.modified_on.as_deref().map(str::trim) {
            None | Some("") => OffsetDateTime::UNIX_EPOCH,
            Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
                .map_err(|_| WireError::InvalidTimestamp(raw.to_string()))?,
        };
        let status = self
            .link_status
            .as_deref()
            .and_then(LinkStatus::parse)
            .unwrap_or_default();
        Ok(Link {
            parent_id: self.work_item_id,
            path: self.path,
            comment: self.comment,
            created_by: self.created_by,
            modified_by: self.modified_by,
            modified_on,
            status,
        })
    }
}
