#![forbid(unsafe_code)]

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("corrupt row for parent {parent_id}: {message}")]
    CorruptRow { parent_id: i64, message: String },
    #[error("lock poisoned for parent {0}")]
    Poisoned(i64),
}
