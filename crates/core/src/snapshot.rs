#![forbid(unsafe_code)]

use crate::model::RepositoryItem;
use crate::telemetry::{Severity, Telemetry};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("repository not found: {repository}")]
    RepositoryNotFound { repository: String },
    #[error("repository listing failed: {0}")]
    Transport(String),
    #[error("repository listing could not be decoded: {0}")]
    Decode(String),
}

/// Recursive file enumeration of one repository branch.
pub trait RepositoryListing: Send + Sync {
    fn list_items(
        &self,
        repository: &str,
        project: &str,
        branch: &str,
    ) -> Result<Vec<RepositoryItem>, SnapshotError>;
}

impl<T: RepositoryListing + ?Sized> RepositoryListing for Arc<T> {
    fn list_items(
        &self,
        repository: &str,
        project: &str,
        branch: &str,
    ) -> Result<Vec<RepositoryItem>, SnapshotError> {
        (**self).list_items(repository, project, branch)
    }
}

/// Point-in-time set of repository files, indexed by exact path.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    files: Vec<RepositoryItem>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Folders are dropped; for duplicate paths the first occurrence wins.
    pub fn from_items(items: impl IntoIterator<Item = RepositoryItem>) -> Self {
        let mut files = Vec::new();
        let mut index = HashMap::new();
        for item in items {
            if item.is_folder || index.contains_key(&item.path) {
                continue;
            }
            index.insert(item.path.clone(), files.len());
            files.push(item);
        }
        Self { files, index }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&RepositoryItem> {
        self.index.get(path).map(|&pos| &self.files[pos])
    }

    /// Files in listing order.
    pub fn files(&self) -> &[RepositoryItem] {
        &self.files
    }
}

pub struct SnapshotLoader<L> {
    listing: L,
    telemetry: Arc<dyn Telemetry>,
}

impl<L: RepositoryListing> SnapshotLoader<L> {
    pub fn new(listing: L, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { listing, telemetry }
    }

    /// Lists the branch and keeps files only. Failures are reported to telemetry, then returned.
    pub fn load(
        &self,
        repository: &str,
        project: &str,
        branch: &str,
    ) -> Result<Vec<RepositoryItem>, SnapshotError> {
        self.telemetry.trace(
            &format!("loading snapshot of {project}/{repository}@{branch}"),
            Severity::Verbose,
        );
        match self.listing.list_items(repository, project, branch) {
            Ok(items) => {
                let files: Vec<RepositoryItem> =
                    items.into_iter().filter(|item| !item.is_folder).collect();
                self.telemetry.trace(
                    &format!("snapshot holds {} files", files.len()),
                    Severity::Verbose,
                );
                Ok(files)
            }
            Err(err) => {
                self.telemetry.exception(&err, Severity::Critical);
                Err(err)
            }
        }
    }

    /// Like [`SnapshotLoader::load`], but degrades to an empty snapshot so callers can continue.
    pub fn load_or_empty(&self, repository: &str, project: &str, branch: &str) -> Snapshot {
        match self.load(repository, project, branch) {
            Ok(files) => Snapshot::from_items(files),
            Err(_) => Snapshot::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NoopTelemetry;

    struct FixedListing(Result<Vec<RepositoryItem>, ()>);

    impl RepositoryListing for FixedListing {
        fn list_items(
            &self,
            repository: &str,
            _project: &str,
            _branch: &str,
        ) -> Result<Vec<RepositoryItem>, SnapshotError> {
            self.0
                .clone()
                .map_err(|_| SnapshotError::RepositoryNotFound {
                    repository: repository.to_string(),
                })
        }
    }

    #[test]
    fn first_duplicate_wins_and_folders_are_dropped() {
        let snapshot = Snapshot::from_items([
            RepositoryItem::folder("/python", "f0"),
            RepositoryItem::file("/python/a.py", "first"),
            RepositoryItem::file("/python/a.py", "second"),
            RepositoryItem::file("/python/b.py", "b"),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains("/python"));
        assert_eq!(
            snapshot.get("/python/a.py").map(|item| item.object_id.as_str()),
            Some("first")
        );
    }

    #[test]
    fn loader_filters_folders() {
        let loader = SnapshotLoader::new(
            FixedListing(Ok(vec![
                RepositoryItem::folder("/", "root"),
                RepositoryItem::file("/README.md", "r"),
            ])),
            Arc::new(NoopTelemetry),
        );
        let files = loader.load("gitrepo", "project", "master").expect("files");
        assert_eq!(files, vec![RepositoryItem::file("/README.md", "r")]);
    }

    #[test]
    fn loader_degrades_to_empty_snapshot() {
        let loader = SnapshotLoader::new(FixedListing(Err(())), Arc::new(NoopTelemetry));
        assert!(matches!(
            loader.load("missing", "project", "master"),
            Err(SnapshotError::RepositoryNotFound { .. })
        ));
        assert!(loader.load_or_empty("missing", "project", "master").is_empty());
    }
}
