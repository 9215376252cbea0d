//! Error types for dual_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for dual_core operations.
#[derive(Error, Debug)]
pub enum DualError {
    /// The registry lock could not be obtained before the timeout elapsed.
    #[error("timed out after {timeout_ms}ms waiting for registry lock at {}", path.display())]
    LockTimeout {
        /// Path to the lock file
        path: PathBuf,
        /// How long we waited
        timeout_ms: u64,
    },

    /// The OS refused the lock syscall for a reason other than contention.
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        /// Path to the lock file
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Project is not present in the registry.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// Context is not present under the given project.
    #[error("context '{context}' not found in project {project}")]
    ContextNotFound {
        /// Project identifier
        project: String,
        /// Context name
        context: String,
    },

    /// Service is not defined in the config.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// Base port is outside the allowed range.
    #[error("invalid base port {0}: must be between 1024 and 65535")]
    InvalidBasePort(u32),

    /// A service port would land above 65535.
    #[error("service index {service_index} overflows the port space from base port {base_port}")]
    PortOverflow {
        /// Context base port
        base_port: u16,
        /// 0-based service index
        service_index: usize,
    },

    /// Another context already owns this exact base port.
    #[error("base port {port} is already used by context '{context}' in project {project}")]
    BasePortInUse {
        /// The contested base port
        port: u16,
        /// Project owning the existing context
        project: String,
        /// Name of the existing context
        context: String,
    },

    /// The candidate port range overlaps an existing context's range.
    #[error("port range overlaps context '{context}' (ports {start}-{end}) at port {port}")]
    PortRangeOverlap {
        /// Name of the existing context
        context: String,
        /// First port of the existing range
        start: u32,
        /// Last port of the existing range
        end: u32,
        /// First overlapping port
        port: u32,
    },

    /// No base port left in the scanned sequence.
    #[error("no available base port starting at {start} with increment {increment}")]
    NoAvailablePort {
        /// First candidate
        start: u16,
        /// Step between candidates
        increment: u16,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry file exists but cannot be parsed.
    #[error("corrupted registry at {}: {}", path.display(), reason)]
    CorruptedRegistry {
        /// Path to the registry file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Serialization error while writing the registry.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Process attribution failed.
    #[error("process lookup failed: {0}")]
    ProcessLookup(String),

    /// The registry handle was already closed.
    #[error("registry handle is closed")]
    RegistryClosed,
}

impl DualError {
    /// Returns true for the missing-entity family (project, context, service).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProjectNotFound(_) | Self::ContextNotFound { .. } | Self::ServiceNotFound(_)
        )
    }

    /// Returns true when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::LockTimeout { .. } => {
                Some("Another dual command is holding the registry. Wait for it to finish and retry.")
            }
            Self::ProjectNotFound(_) => {
                Some("No contexts are registered for this project yet. Run 'dual create <context>'.")
            }
            Self::ContextNotFound { .. } => {
                Some("Run 'dual list' to see registered contexts, or 'dual create <context>'.")
            }
            Self::ServiceNotFound(_) => Some("Check the services section of dual.config.yml."),
            Self::InvalidBasePort(_) => Some("Pick a base port between 1024 and 65535."),
            Self::BasePortInUse { .. } | Self::PortRangeOverlap { .. } | Self::PortOverflow { .. } => {
                Some("Choose a different --base-port, or omit it to allocate one automatically.")
            }
            Self::CorruptedRegistry { .. } => {
                Some("Inspect .dual/registry.json by hand; the previous save is never partially written.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for dual_core operations.
pub type Result<T> = std::result::Result<T, DualError>;
