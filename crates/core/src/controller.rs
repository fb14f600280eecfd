#![forbid(unsafe_code)]

//! Row state machine for one table instance.
//!
//! Rows move between `New`, `Ok` and `Broken`:
//!
//! - `add` creates a `New` row locally;
//! - a successful save makes it `Ok` (or `Broken` when a loaded snapshot lacks the path);
//! - a failed save or delete makes it `Broken` and keeps it visible for a retry;
//! - a successful delete, or deleting a `New` row, removes it.
//!
//! Only a `New` row may change its path; once saved, the path is part of the stored key.
//!
//! Network calls go through the split-phase `begin_*`/`finish_*` pairs so that the owner can run
//! them elsewhere and fold the result back later. While a row has a call in flight it rejects
//! every other mutation.

use crate::gateway::{LinkGateway, ParentRecord, TransportError, UserIdentity};
use crate::model::{Link, LinkStatus, ParentId, RepositoryItem};
use crate::reconcile::{SortOrder, reconcile, sort_rows};
use crate::rows::{
    DELETE_FAILED_MESSAGE, MISSING_FILE_MESSAGE, RowId, RowIdAllocator, RowViewModel,
    SAVE_FAILED_MESSAGE, WebUrlBuilder,
};
use crate::snapshot::{RepositoryListing, Snapshot, SnapshotLoader};
use crate::telemetry::{Severity, Telemetry};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("links cannot be added before the parent record is saved")]
    ParentNotPersisted,
    #[error("unknown row {0}")]
    UnknownRow(RowId),
    #[error("row {0} has an operation in flight")]
    RowBusy(RowId),
    #[error("row {0} has no path selected")]
    PathNotSelected(RowId),
    #[error("row {0} is persisted; its path can no longer change")]
    PathLocked(RowId),
    #[error("{0} row operation(s) still in flight")]
    OperationsInFlight(usize),
    #[error("loading links failed: {0}")]
    LoadFailed(#[from] TransportError),
}

/// Repository the table reconciles against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepositoryRef {
    pub organization: String,
    pub project: String,
    pub repository: String,
    pub branch: String,
}

impl RepositoryRef {
    pub fn web_urls(&self) -> WebUrlBuilder {
        WebUrlBuilder::new(
            self.organization.clone(),
            self.project.clone(),
            self.repository.clone(),
            self.branch.clone(),
        )
    }
}

pub struct Collaborators {
    pub gateway: Arc<dyn LinkGateway>,
    pub listing: Arc<dyn RepositoryListing>,
    pub parent: Arc<dyn ParentRecord>,
    pub user: Arc<dyn UserIdentity>,
    pub telemetry: Arc<dyn Telemetry>,
}

pub type ChangeListener = Box<dyn Fn(&[RowViewModel]) + Send>;

/// A save that has been issued but not yet folded back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSave {
    pub row: RowId,
    pub link: Link,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingDelete {
    pub row: RowId,
    pub parent_id: ParentId,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteStep {
    /// The row was never persisted and is already gone.
    RemovedLocally,
    Remote(PendingDelete),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    RemovedLocally,
    Removed,
    Failed,
}

pub struct RowLifecycleController {
    parent_id: ParentId,
    urls: WebUrlBuilder,
    gateway: Arc<dyn LinkGateway>,
    user: Arc<dyn UserIdentity>,
    telemetry: Arc<dyn Telemetry>,
    parent_is_new: Arc<AtomicBool>,
    snapshot: Snapshot,
    rows: Vec<RowViewModel>,
    ids: RowIdAllocator,
    in_flight: HashSet<RowId>,
    sort: SortOrder,
    listeners: Vec<ChangeListener>,
}

impl RowLifecycleController {
    /// Runs the startup sequence: parent identity, is-new signal, snapshot, links, reconcile.
    ///
    /// Snapshot and link failures are reported to telemetry and degrade to empty inputs; opening
    /// itself never fails.
    pub fn open(repository: &RepositoryRef, deps: Collaborators) -> Self {
        let Collaborators {
            gateway,
            listing,
            parent,
            user,
            telemetry,
        } = deps;
        telemetry.event("Initialization started", Severity::Verbose);

        let parent_id = parent.id();
        let parent_is_new = Arc::new(AtomicBool::new(parent.is_new()));
        {
            let flag = Arc::clone(&parent_is_new);
            let telemetry = Arc::clone(&telemetry);
            parent.subscribe_saved(Box::new(move |is_new| {
                telemetry.event("parent saved", Severity::Verbose);
                flag.store(is_new, Ordering::SeqCst);
            }));
        }

        let snapshot = SnapshotLoader::new(listing, Arc::clone(&telemetry)).load_or_empty(
            &repository.repository,
            &repository.project,
            &repository.branch,
        );

        let links = match gateway.fetch_links(parent_id) {
            Ok(links) => links,
            Err(err) => {
                telemetry.exception(&err, Severity::Error);
                Vec::new()
            }
        };

        let urls = repository.web_urls();
        let mut ids = RowIdAllocator::default();
        let rows = reconcile(&links, &snapshot, &urls, &mut ids);
        telemetry.event("Initialization finished", Severity::Verbose);

        Self {
            parent_id,
            urls,
            gateway,
            user,
            telemetry,
            parent_is_new,
            snapshot,
            rows,
            ids,
            in_flight: HashSet::new(),
            sort: SortOrder::Unsorted,
            listeners: Vec::new(),
        }
    }

    pub fn parent_id(&self) -> ParentId {
        self.parent_id
    }

    pub fn can_add(&self) -> bool {
        !self.parent_is_new.load(Ordering::SeqCst)
    }

    /// Rows in persisted/insertion order.
    pub fn rows(&self) -> &[RowViewModel] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&RowViewModel> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Rows in the current sort order.
    pub fn visible_rows(&self) -> Vec<RowViewModel> {
        let mut rows = self.rows.clone();
        sort_rows(&mut rows, self.sort);
        rows
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Selectable files for a row's path.
    pub fn files(&self) -> &[RepositoryItem] {
        self.snapshot.files()
    }

    pub fn on_change(&mut self, listener: impl Fn(&[RowViewModel]) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn toggle_path_sort(&mut self) -> SortOrder {
        self.sort = self.sort.next();
        self.notify();
        self.sort
    }

    pub fn add(&mut self) -> Result<RowId, ControllerError> {
        if !self.can_add() {
            return Err(ControllerError::ParentNotPersisted);
        }
        let id = self.ids.next_id();
        self.rows
            .push(RowViewModel::new_unsaved(id, self.user.current_user()));
        self.notify();
        Ok(id)
    }

    pub fn select_path(&mut self, id: RowId, path: &str) -> Result<(), ControllerError> {
        let web_url = self.urls.url_for(path);
        let row = self.idle_row_mut(id)?;
        if !row.is_new() {
            return Err(ControllerError::PathLocked(id));
        }
        row.path = path.to_string();
        row.web_url = web_url;
        self.telemetry
            .trace(&format!("{id} selected {path}"), Severity::Verbose);
        self.notify();
        Ok(())
    }

    pub fn set_comment(&mut self, id: RowId, comment: &str) -> Result<(), ControllerError> {
        let row = self.idle_row_mut(id)?;
        row.draft_comment = comment.to_string();
        self.notify();
        Ok(())
    }

    pub fn begin_save(&mut self, id: RowId) -> Result<PendingSave, ControllerError> {
        let parent_id = self.parent_id;
        let acting_user = self.user.current_user();
        let row = self.idle_row_mut(id)?;
        if row.path.is_empty() {
            return Err(ControllerError::PathNotSelected(id));
        }
        let link = Link {
            parent_id,
            path: row.path.clone(),
            comment: row.draft_comment.clone(),
            created_by: row.created_by.clone(),
            modified_by: acting_user,
            modified_on: OffsetDateTime::now_utc(),
            status: LinkStatus::Ok,
        };
        self.in_flight.insert(id);
        self.telemetry.trace(
            &format!("saving {id} as {}#{}", link.parent_id, link.path),
            Severity::Verbose,
        );
        Ok(PendingSave { row: id, link })
    }

    /// Folds a save result back. Returns `None` when the row is gone and the result was dropped.
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        result: Result<(), TransportError>,
    ) -> Option<LinkStatus> {
        self.in_flight.remove(&pending.row);
        if let Err(err) = &result {
            self.telemetry.exception(err, Severity::Error);
        }
        let path_missing =
            !self.snapshot.is_empty() && !self.snapshot.contains(&pending.link.path);
        let row = self.rows.iter_mut().find(|row| row.id == pending.row)?;
        match result {
            Ok(()) => {
                row.comment = pending.link.comment;
                if path_missing {
                    row.mark_broken(MISSING_FILE_MESSAGE);
                } else {
                    row.mark_ok();
                }
            }
            Err(_) => row.mark_broken(SAVE_FAILED_MESSAGE),
        }
        let status = row.status;
        self.notify();
        Some(status)
    }

    pub fn save(&mut self, id: RowId) -> Result<LinkStatus, ControllerError> {
        let pending = self.begin_save(id)?;
        let result = self.gateway.save_link(&pending.link);
        self.finish_save(pending, result)
            .ok_or(ControllerError::UnknownRow(id))
    }

    pub fn begin_delete(&mut self, id: RowId) -> Result<DeleteStep, ControllerError> {
        let parent_id = self.parent_id;
        let row = self.idle_row_mut(id)?;
        if row.is_new() {
            self.rows.retain(|row| row.id != id);
            self.telemetry
                .trace(&format!("discarded unsaved {id}"), Severity::Verbose);
            self.notify();
            return Ok(DeleteStep::RemovedLocally);
        }
        let pending = PendingDelete {
            row: id,
            parent_id,
            path: row.path.clone(),
        };
        self.in_flight.insert(id);
        self.telemetry.trace(
            &format!("deleting {id} as {}#{}", pending.parent_id, pending.path),
            Severity::Verbose,
        );
        Ok(DeleteStep::Remote(pending))
    }

    /// Folds a delete result back. Returns `None` when the row is gone and the result was dropped.
    pub fn finish_delete(
        &mut self,
        pending: PendingDelete,
        result: Result<(), TransportError>,
    ) -> Option<DeleteOutcome> {
        self.in_flight.remove(&pending.row);
        if let Err(err) = &result {
            self.telemetry.exception(err, Severity::Error);
        }
        let pos = self.rows.iter().position(|row| row.id == pending.row)?;
        let outcome = match result {
            Ok(()) => {
                self.rows.remove(pos);
                DeleteOutcome::Removed
            }
            Err(_) => {
                self.rows[pos].mark_broken(DELETE_FAILED_MESSAGE);
                DeleteOutcome::Failed
            }
        };
        self.notify();
        Some(outcome)
    }

    pub fn delete(&mut self, id: RowId) -> Result<DeleteOutcome, ControllerError> {
        match self.begin_delete(id)? {
            DeleteStep::RemovedLocally => Ok(DeleteOutcome::RemovedLocally),
            DeleteStep::Remote(pending) => {
                let result = self.gateway.delete_link(pending.parent_id, &pending.path);
                self.finish_delete(pending, result)
                    .ok_or(ControllerError::UnknownRow(id))
            }
        }
    }

    /// Refetches links and reconciles them against the current snapshot.
    ///
    /// Unsaved rows survive the reload. Refused while any row has a call in flight; on a fetch
    /// failure the current rows stay as they are.
    pub fn reload(&mut self) -> Result<usize, ControllerError> {
        if !self.in_flight.is_empty() {
            return Err(ControllerError::OperationsInFlight(self.in_flight.len()));
        }
        let links = self.gateway.fetch_links(self.parent_id).map_err(|err| {
            self.telemetry.exception(&err, Severity::Error);
            err
        })?;
        let mut rows = reconcile(&links, &self.snapshot, &self.urls, &mut self.ids);
        let loaded = rows.len();
        rows.extend(self.rows.drain(..).filter(RowViewModel::is_new));
        self.rows = rows;
        self.notify();
        Ok(loaded)
    }

    fn idle_row_mut(&mut self, id: RowId) -> Result<&mut RowViewModel, ControllerError> {
        if self.in_flight.contains(&id) {
            return Err(ControllerError::RowBusy(id));
        }
        self.rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(ControllerError::UnknownRow(id))
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let visible = self.visible_rows();
        for listener in &self.listeners {
            listener(&visible);
        }
    }
}
