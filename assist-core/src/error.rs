use thiserror::Error;

use crate::catalog::CatalogError;
use crate::gateway::GatewayError;
use crate::renderer::RenderError;
use crate::session_store::StoreError;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Why a conversational turn did not complete.
///
/// Any variant means the turn was abandoned and nothing about the session
/// was persisted.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{0}")]
    ClientInput(String),

    #[error("upstream failure: {0}")]
    Upstream(#[from] GatewayError),

    #[error("reply rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
}

impl TurnError {
    /// Short machine-readable label used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::ClientInput(_) => "client_input",
            TurnError::Upstream(_) => "upstream",
            TurnError::Render(_) => "render",
            TurnError::Store(_) => "store",
        }
    }

    /// Gateway operation that failed, if the failure came from one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            TurnError::Upstream(e) => Some(e.operation().as_str()),
            _ => None,
        }
    }
}
