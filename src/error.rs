use thiserror::Error;

use crate::env::EnvState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("launch error: {0}")]
    Launch(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unsupported space kind `{kind}` (shape {shape:?})")]
    UnsupportedSpaceKind { kind: String, shape: Vec<usize> },

    #[error("invalid space: {0}")]
    InvalidSpace(String),

    #[error("value does not match space: {0}")]
    InvalidValue(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("cannot {operation} while the environment is {state:?}")]
    InvalidState {
        state: EnvState,
        operation: &'static str,
    },
}

impl Error {
    pub(crate) fn unsupported(kind: impl Into<String>, shape: &[usize]) -> Self {
        Error::UnsupportedSpaceKind {
            kind: kind.into(),
            shape: shape.to_vec(),
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::Connection("callback listener stopped before the model finished its setup".into())
    }
}
