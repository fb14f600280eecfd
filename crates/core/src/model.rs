#![forbid(unsafe_code)]

use time::OffsetDateTime;

/// Identifier of the record that owns a set of links (a work item id on the wire).
pub type ParentId = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    /// Created locally, never persisted.
    New,
    #[default]
    Ok,
    /// Path missing from the snapshot, or the last save/delete failed.
    Broken,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ok => "OK",
            Self::Broken => "BROKEN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "NEW" => Some(Self::New),
            "OK" => Some(Self::Ok),
            "BROKEN" => Some(Self::Broken),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Ok => "OK",
            Self::Broken => "Broken",
        }
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted association between a parent record and a repository path.
///
/// Identity is `(parent_id, path)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub parent_id: ParentId,
    pub path: String,
    pub comment: String,
    pub created_by: String,
    pub modified_by: String,
    pub modified_on: OffsetDateTime,
    pub status: LinkStatus,
}

impl Link {
    pub fn new(parent_id: ParentId, path: impl Into<String>) -> Self {
        Self {
            parent_id,
            path: path.into(),
            comment: String::new(),
            created_by: String::new(),
            modified_by: String::new(),
            modified_on: OffsetDateTime::UNIX_EPOCH,
            status: LinkStatus::Ok,
        }
    }

    pub fn same_identity(&self, other: &Link) -> bool {
        self.parent_id == other.parent_id && self.path == other.path
    }
}

/// One entry of a repository listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryItem {
    pub path: String,
    pub is_folder: bool,
    pub object_id: String,
}

impl RepositoryItem {
    pub fn file(path: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_folder: false,
            object_id: object_id.into(),
        }
    }

    pub fn folder(path: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_folder: true,
            object_id: object_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_status_wire_names() {
        for status in [LinkStatus::New, LinkStatus::Ok, LinkStatus::Broken] {
            assert_eq!(LinkStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LinkStatus::parse("ok"), None);
        assert_eq!(LinkStatus::parse(" BROKEN "), Some(LinkStatus::Broken));
        assert_eq!(LinkStatus::Broken.label(), "Broken");
    }

    #[test]
    fn identity_ignores_metadata() {
        let mut a = Link::new(7, "/a.txt");
        let b = Link::new(7, "/a.txt");
        a.comment = "changed".to_string();
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&Link::new(8, "/a.txt")));
    }
}
