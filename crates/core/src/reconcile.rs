#![forbid(unsafe_code)]

use crate::model::{Link, LinkStatus};
use crate::rows::{MISSING_FILE_MESSAGE, RowIdAllocator, RowViewModel, WebUrlBuilder};
use crate::snapshot::Snapshot;

/// Merges persisted links with a snapshot into rows, in persisted order.
///
/// An empty snapshot marks every persisted link broken: an unknown repository state is never
/// treated as consistent. Links still in `New` state pass through untouched.
pub fn reconcile(
    links: &[Link],
    snapshot: &Snapshot,
    urls: &WebUrlBuilder,
    ids: &mut RowIdAllocator,
) -> Vec<RowViewModel> {
    links
        .iter()
        .map(|link| {
            let mut row = RowViewModel::from_link(ids.next_id(), link, urls.url_for(&link.path));
            match link.status {
                LinkStatus::New => {}
                _ if snapshot.contains(&link.path) => row.mark_ok(),
                _ => row.mark_broken(MISSING_FILE_MESSAGE),
            }
            row
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

impl SortOrder {
    /// Next state after a click on the column header.
    pub fn next(self) -> Self {
        match self {
            Self::Unsorted | Self::Descending => Self::Ascending,
            Self::Ascending => Self::Descending,
        }
    }
}

/// Stable sort on path; byte order, so case-sensitive.
pub fn sort_rows(rows: &mut [RowViewModel], order: SortOrder) {
    match order {
        SortOrder::Unsorted => {}
        SortOrder::Ascending => rows.sort_by(|a, b| a.path.cmp(&b.path)),
        SortOrder::Descending => rows.sort_by(|a, b| b.path.cmp(&a.path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositoryItem;
    use crate::rows::RowId;

    fn urls() -> WebUrlBuilder {
        WebUrlBuilder::new("org", "proj", "gitrepo", "master")
    }

    fn row(id: &mut RowIdAllocator, path: &str) -> RowViewModel {
        RowViewModel::from_link(id.next_id(), &Link::new(1, path), String::new())
    }

    #[test]
    fn matching_path_is_ok_and_missing_path_is_broken() {
        let links = vec![
            Link::new(999, "/python/somescript.py"),
            Link::new(999, "/python/asdfasdf.py"),
        ];
        let snapshot = Snapshot::from_items([RepositoryItem::file("/python/somescript.py", "1")]);
        let rows = reconcile(&links, &snapshot, &urls(), &mut RowIdAllocator::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, LinkStatus::Ok);
        assert_eq!(rows[0].error, None);
        assert!(rows[0].web_url.ends_with("path=%2Fpython%2Fsomescript.py&version=GBmaster"));
        assert_eq!(rows[1].status, LinkStatus::Broken);
        assert_eq!(rows[1].error.as_deref(), Some(MISSING_FILE_MESSAGE));
    }

    #[test]
    fn empty_snapshot_breaks_everything() {
        let mut stale_ok = Link::new(1, "/a");
        stale_ok.status = LinkStatus::Ok;
        let links = vec![stale_ok, Link::new(1, "/b")];
        let rows = reconcile(
            &links,
            &Snapshot::empty(),
            &urls(),
            &mut RowIdAllocator::default(),
        );
        assert!(rows.iter().all(|row| row.status == LinkStatus::Broken));
    }

    #[test]
    fn new_links_pass_through() {
        let mut link = Link::new(1, "/never/saved");
        link.status = LinkStatus::New;
        let rows = reconcile(
            &[link],
            &Snapshot::empty(),
            &urls(),
            &mut RowIdAllocator::default(),
        );
        assert_eq!(rows[0].status, LinkStatus::New);
        assert_eq!(rows[0].error, None);
    }

    #[test]
    fn persisted_order_is_kept() {
        let links = vec![Link::new(1, "/z"), Link::new(1, "/a"), Link::new(1, "/m")];
        let rows = reconcile(
            &links,
            &Snapshot::empty(),
            &urls(),
            &mut RowIdAllocator::default(),
        );
        let paths: Vec<&str> = rows.iter().map(|row| row.path.as_str()).collect();
        assert_eq!(paths, ["/z", "/a", "/m"]);
    }

    #[test]
    fn sort_cycle() {
        let order = SortOrder::default();
        assert_eq!(order, SortOrder::Unsorted);
        let order = order.next();
        assert_eq!(order, SortOrder::Ascending);
        let order = order.next();
        assert_eq!(order, SortOrder::Descending);
        assert_eq!(order.next(), SortOrder::Ascending);
    }

    #[test]
    fn sorting_is_case_sensitive_and_stable() {
        let mut ids = RowIdAllocator::default();
        let mut rows = vec![
            row(&mut ids, "/b"),
            row(&mut ids, "/B"),
            row(&mut ids, "/a"),
            row(&mut ids, "/b"),
        ];
        let first_b: RowId = rows[0].id;
        let second_b: RowId = rows[3].id;

        sort_rows(&mut rows, SortOrder::Ascending);
        let paths: Vec<&str> = rows.iter().map(|row| row.path.as_str()).collect();
        assert_eq!(paths, ["/B", "/a", "/b", "/b"]);
        assert_eq!(rows[2].id, first_b);
        assert_eq!(rows[3].id, second_b);

        sort_rows(&mut rows, SortOrder::Descending);
        let paths: Vec<&str> = rows.iter().map(|row| row.path.as_str()).collect();
        assert_eq!(paths, ["/b", "/b", "/a", "/B"]);
        assert_eq!(rows[0].id, first_b);
        assert_eq!(rows[1].id, second_b);
    }
}
