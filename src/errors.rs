//! Error types for the snapshotter deployment toolkit
//!
//! Each failure domain (markets manifest, credential resolution, slot
//! discovery, deployment, external tools) gets its own struct error with
//! contextual fields, wrapped by the unified [`SnapshotterError`] enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Markets manifest errors
// =============================================================================

/// Error when fetching or parsing the remote markets manifest fails
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Markets config error: {message}")]
pub struct MarketsConfigError {
    /// Detailed error message
    pub message: String,
    /// The manifest URL that failed
    pub url: Option<String>,
}

impl MarketsConfigError {
    /// Create a new markets config error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: None,
        }
    }

    /// Create a new markets config error with the manifest URL
    pub fn with_url(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: Some(url.into()),
        }
    }
}

// =============================================================================
// Credential resolution errors
// =============================================================================

/// Error when a credential cannot be resolved from any configured source
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Credential error: {message}")]
pub struct CredentialError {
    /// Detailed error message
    pub message: String,
    /// The variable name that could not be resolved
    pub variable: Option<String>,
    /// The chain the lookup was scoped to
    pub chain: Option<String>,
}

impl CredentialError {
    /// Create a new credential error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variable: None,
            chain: None,
        }
    }

    /// Create a new credential error with the variable and chain scope
    pub fn with_variable(
        message: impl Into<String>,
        variable: impl Into<String>,
        chain: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            variable: Some(variable.into()),
            chain: Some(chain.into()),
        }
    }
}

// =============================================================================
// Slot discovery errors
// =============================================================================

/// Error when querying slot ownership from the protocol chain fails
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Slot query error: {message}")]
pub struct SlotQueryError {
    /// Detailed error message
    pub message: String,
    /// The RPC URL the query was issued against
    pub rpc_url: Option<String>,
    /// The contract address involved, if known
    pub contract: Option<String>,
}

impl SlotQueryError {
    /// Create a new slot query error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rpc_url: None,
            contract: None,
        }
    }

    /// Create a new slot query error with RPC URL
    pub fn with_url(message: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rpc_url: Some(rpc_url.into()),
            contract: None,
        }
    }

    /// Create a new slot query error with RPC URL and contract address
    pub fn with_contract(
        message: impl Into<String>,
        rpc_url: impl Into<String>,
        contract: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            rpc_url: Some(rpc_url.into()),
            contract: Some(contract.into()),
        }
    }
}

// =============================================================================
// Deployment errors
// =============================================================================

/// Error during instance deployment (directory setup, env rendering, launch)
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Deployment error: {message}")]
pub struct DeploymentError {
    /// Detailed error message
    pub message: String,
    /// The slot being deployed, if applicable
    pub slot_id: Option<u64>,
    /// The market being deployed, if applicable
    pub market: Option<String>,
}

impl DeploymentError {
    /// Create a new deployment error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            slot_id: None,
            market: None,
        }
    }

    /// Create a new deployment error scoped to a slot and market
    pub fn with_slot(message: impl Into<String>, slot_id: u64, market: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            slot_id: Some(slot_id),
            market: Some(market.into()),
        }
    }
}

// =============================================================================
// External tool errors
// =============================================================================

/// Error when invoking git fails
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Git error: {message}")]
pub struct GitError {
    /// Detailed error message
    pub message: String,
    /// Captured stderr from the git process, if any
    pub stderr: Option<String>,
}

impl GitError {
    /// Create a new git error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stderr: None,
        }
    }

    /// Create a new git error with captured stderr
    pub fn with_stderr(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stderr: Some(stderr.into()),
        }
    }
}

/// Error when managing screen sessions fails
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Screen error: {message}")]
pub struct ScreenError {
    /// Detailed error message
    pub message: String,
    /// The session name involved, if any
    pub session: Option<String>,
}

impl ScreenError {
    /// Create a new screen error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session: None,
        }
    }

    /// Create a new screen error with the session name
    pub fn with_session(message: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session: Some(session.into()),
        }
    }
}

/// Error when talking to the Docker daemon fails
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("Docker error: {message}")]
pub struct DockerError {
    /// Detailed error message
    pub message: String,
    /// Whether the docker binary itself was missing
    pub binary_missing: bool,
}

impl DockerError {
    /// Create a new docker error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            binary_missing: false,
        }
    }

    /// Create a docker error for a missing docker binary
    pub fn missing_binary() -> Self {
        Self {
            message: "docker command not found. Is Docker installed?".to_string(),
            binary_missing: true,
        }
    }
}

// =============================================================================
// Unified error enum
// =============================================================================

/// Unified error type for all snapshotter toolkit operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum SnapshotterError {
    #[error(transparent)]
    MarketsConfig(#[from] MarketsConfigError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    SlotQuery(#[from] SlotQueryError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error(transparent)]
    Docker(#[from] DockerError),

    // External library errors (converted to String for Serialize/Deserialize)
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for SnapshotterError {
    fn from(err: reqwest::Error) -> Self {
        SnapshotterError::Http(err.to_string())
    }
}

impl From<std::io::Error> for SnapshotterError {
    fn from(err: std::io::Error) -> Self {
        SnapshotterError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapshotterError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotterError::Json(err.to_string())
    }
}

/// Result type alias for snapshotter toolkit operations
pub type SnapshotterResult<T> = Result<T, SnapshotterError>;

impl SnapshotterError {
    /// Create an unknown error from any error type
    pub fn unknown(err: impl std::fmt::Display) -> Self {
        SnapshotterError::Unknown(err.to_string())
    }

    /// Check if this is a credential resolution error
    pub fn is_credential_error(&self) -> bool {
        matches!(self, SnapshotterError::Credential(_))
    }

    /// Check if this is a slot query error
    pub fn is_slot_query_error(&self) -> bool {
        matches!(self, SnapshotterError::SlotQuery(_))
    }

    /// Check if this error means the Docker binary is absent
    pub fn is_docker_missing(&self) -> bool {
        matches!(self, SnapshotterError::Docker(d) if d.binary_missing)
    }
}
