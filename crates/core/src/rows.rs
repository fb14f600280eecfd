#![forbid(unsafe_code)]

use crate::model::{Link, LinkStatus};

pub const MISSING_FILE_MESSAGE: &str = "The referenced file does no longer exist.";
pub const SAVE_FAILED_MESSAGE: &str = "Error while trying to save.";
pub const DELETE_FAILED_MESSAGE: &str = "Error while trying to delete.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// Hands out row ids that are never reused within one allocator.
#[derive(Debug, Default)]
pub struct RowIdAllocator {
    next: u64,
}

impl RowIdAllocator {
    pub fn next_id(&mut self) -> RowId {
        self.next = self.next.saturating_add(1);
        RowId(self.next)
    }
}

/// Display-ready projection of a link. Never persisted directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowViewModel {
    pub id: RowId,
    pub path: String,
    pub status: LinkStatus,
    /// Last persisted comment.
    pub comment: String,
    /// Comment as currently edited; sent on save.
    pub draft_comment: String,
    pub created_by: String,
    pub error: Option<String>,
    pub web_url: String,
}

impl RowViewModel {
    pub fn new_unsaved(id: RowId, created_by: impl Into<String>) -> Self {
        Self {
            id,
            path: String::new(),
            status: LinkStatus::New,
            comment: String::new(),
            draft_comment: String::new(),
            created_by: created_by.into(),
            error: None,
            web_url: String::new(),
        }
    }

    pub fn from_link(id: RowId, link: &Link, web_url: String) -> Self {
        Self {
            id,
            path: link.path.clone(),
            status: link.status,
            comment: link.comment.clone(),
            draft_comment: link.comment.clone(),
            created_by: link.created_by.clone(),
            error: None,
            web_url,
        }
    }

    pub fn mark_ok(&mut self) {
        self.status = LinkStatus::Ok;
        self.error = None;
    }

    pub fn mark_broken(&mut self, message: &str) {
        self.status = LinkStatus::Broken;
        self.error = Some(message.to_string());
    }

    pub fn is_new(&self) -> bool {
        self.status == LinkStatus::New
    }
}

/// Builds links into the hosted repository web UI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebUrlBuilder {
    pub organization: String,
    pub project: String,
    pub repository: String,
    pub branch: String,
}

impl WebUrlBuilder {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            repository: repository.into(),
            branch: branch.into(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        format!(
            "https://dev.azure.com/{}/{}/_git/{}?path={}&version=GB{}",
            self.organization,
            self.project,
            self.repository,
            encode_uri_component(path),
            self.branch
        )
    }
}

/// Percent-encodes everything except the characters JavaScript's `encodeURIComponent` keeps.
pub fn encode_uri_component(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')'
            );
        if keep {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(
            encode_uri_component("/python/some script.py"),
            "%2Fpython%2Fsome%20script.py"
        );
        assert_eq!(encode_uri_component("a-b_c.d!~*'()"), "a-b_c.d!~*'()");
        assert_eq!(encode_uri_component("ä"), "%C3%A4");
    }

    #[test]
    fn web_url_points_at_branch() {
        let urls = WebUrlBuilder::new("contoso", "Fabrikam", "gitrepo", "master");
        assert_eq!(
            urls.url_for("/python/somescript.py"),
            "https://dev.azure.com/contoso/Fabrikam/_git/gitrepo?path=%2Fpython%2Fsomescript.py&version=GBmaster"
        );
        assert_eq!(urls.url_for(""), "");
    }

    #[test]
    fn row_ids_are_not_reused() {
        let mut ids = RowIdAllocator::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
