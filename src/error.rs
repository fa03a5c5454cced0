use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid schema descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("table '{table}' references '{references}' which is not declared before it")]
    DependencyOrder { table: String, references: String },

    #[error("database connection unusable: {0}")]
    Connection(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("unsupported schema change: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;
