#![forbid(unsafe_code)]

pub(super) const SCHEMA_VERSION: &str = "v1";

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        -- One row per (parent, path). `seq` orders a parent's links; a replaced link gets a
        -- fresh seq and so moves to the end.
        CREATE TABLE IF NOT EXISTS links (
          parent_id INTEGER NOT NULL,
          path TEXT NOT NULL,
          seq INTEGER NOT NULL,
          comment TEXT NOT NULL,
          created_by TEXT NOT NULL,
          modified_by TEXT NOT NULL,
          modified_on TEXT NOT NULL,
          link_status TEXT NOT NULL,
          PRIMARY KEY (parent_id, path)
        );

        CREATE INDEX IF NOT EXISTS links_parent_seq ON links(parent_id, seq);
"#;
