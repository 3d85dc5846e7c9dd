use std::path::PathBuf;

use thiserror::Error;

/// A registered type cannot be turned into a parameter schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntrospectionError {
    #[error("type '{0}' is not registered in the catalog")]
    UnknownType(String),

    #[error("type '{0}' does not expose an inspectable constructor")]
    NoSignature(String),
}

/// A spout package could not be loaded.
#[derive(Error, Debug)]
pub enum ModuleLoadError {
    #[error("failed to read package manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("package {} exports '{name}', which is not linked into this binary", .path.display())]
    UnresolvedExport { path: PathBuf, name: String },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("spouts directory does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("failed to walk spouts directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    ModuleLoad(#[from] ModuleLoadError),

    #[error("failed to introspect {name} in {}: {source}", .package.display())]
    Introspection {
        name: String,
        package: PathBuf,
        #[source]
        source: IntrospectionError,
    },
}

/// Invalid selection of backend modes or flag values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown output mode '{0}' (expected one of: batch, streaming, stream_to_batch)")]
    UnknownOutputMode(String),

    #[error(
        "unknown state mode '{0}' (expected one of: none, in_memory, redis, postgres, dynamodb, prometheus)"
    )]
    UnknownStateMode(String),

    #[error("missing required argument '--{0}'")]
    MissingArgument(String),

    #[error("invalid value '{value}' for '--{name}': expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("'{component}' requires parameter '{name}', which clashes with the reserved flag '--{name}'")]
    ReservedParameter { component: String, name: String },
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to construct {backend} backend: {reason}")]
    Construction { backend: String, reason: String },

    #[error("{backend} backend I/O failed: {source}")]
    Io {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} client error: {message}")]
    Client { backend: String, message: String },

    #[error("failed to encode or decode backend payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn construction(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::Construction {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn client(backend: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Client {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// A spout factory rejected its arguments or backends.
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error(transparent)]
    Argument(#[from] ConfigurationError),

    #[error("'{0}' is abstract and cannot be instantiated")]
    Abstract(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("'{component}' has no method '{method}' (available: {})", .available.join(", "))]
pub struct MethodNotFoundError {
    pub component: String,
    pub method: String,
    pub available: Vec<String>,
}

/// Raised by the invoked spout method itself.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' must be {expected}, got {got}")]
    InvalidArgument {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("unsupported method '{0}'")]
    UnsupportedMethod(String),

    #[error("{0}")]
    Failed(String),
}

/// Fatal failure of a single dispatch, tagged by the stage that produced it.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    BackendConstruction(BackendError),

    #[error("failed to construct '{component}': {source}")]
    ComponentConstruction {
        component: String,
        #[source]
        source: ConstructionError,
    },

    #[error(transparent)]
    MethodNotFound(#[from] MethodNotFoundError),

    #[error("'{method}' failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: InvocationError,
    },
}

impl DispatchError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::Invocation { .. } => 1,
            DispatchError::Configuration(_) => 2,
            DispatchError::BackendConstruction(_) => 3,
            DispatchError::ComponentConstruction { .. } => 4,
            DispatchError::MethodNotFound(_) => 5,
        }
    }
}
