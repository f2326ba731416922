use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("invalid key path: {0:?}")]
    InvalidKeyPath(String),

    #[error("unknown field: {0}")]
    UnknownField(String),
}
