//! Error types for schema wrapping, delegation and loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Phase;

/// Schema model construction failures.
///
/// Fatal to a wrap operation; never recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid SDL: {message}")]
    Parse { message: String },

    #[error("{location} references unknown type \"{reference}\"")]
    DanglingReference { location: String, reference: String },

    #[error("type \"{name}\" is defined twice")]
    DuplicateType { name: String },

    #[error("type \"{name}\" is defined as both {first} and {second}")]
    IncompatibleType {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("{location} must reference {expected} type, \"{reference}\" is {actual}")]
    WrongKind {
        location: String,
        reference: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("gateway field {type_name}.{field_name} has no resolver")]
    NotExecutable {
        type_name: String,
        field_name: String,
    },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Operation document failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("invalid document: {message}")]
    Parse { message: String },

    #[error("document contains no operation")]
    NoOperation,

    #[error("unknown operation \"{name}\"")]
    UnknownOperation { name: String },

    #[error("document contains several operations; an operation name is required")]
    AmbiguousOperation,
}

/// Faults raised by a transform implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("transform {transform} failed in {phase} phase: {message}")]
    Application {
        transform: String,
        phase: Phase,
        message: String,
    },

    #[error("transform {transform} found no {expected} state from its request phase")]
    MissingState {
        transform: String,
        expected: &'static str,
    },
}

impl TransformError {
    pub fn new(transform: impl Into<String>, phase: Phase, message: impl Into<String>) -> Self {
        TransformError::Application {
            transform: transform.into(),
            phase,
            message: message.into(),
        }
    }

    /// Wraps a schema rebuild failure raised while applying `transform`.
    pub fn schema(transform: impl Into<String>, source: SchemaError) -> Self {
        Self::new(transform, Phase::Schema, source.to_string())
    }
}

/// Errors while deriving a gateway schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WrapError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl WrapError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Hard fault raised by an execution capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("execution cancelled")]
    Cancelled,

    #[error("{message}")]
    Upstream { message: String },
}

/// Control-flow faults of a single delegated operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DelegationError {
    #[error(transparent)]
    Transform(TransformError),

    #[error("delegation state error: {0}")]
    State(TransformError),

    #[error("original schema has no {operation} root type")]
    MissingRootType { operation: &'static str },

    #[error("delegation of {field} was cancelled")]
    Cancelled { field: String },
}

impl From<TransformError> for DelegationError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::MissingState { .. } => DelegationError::State(err),
            other => DelegationError::Transform(other),
        }
    }
}

/// Errors in the declarative transform configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid regex \"{pattern}\": {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid field coordinate \"{coordinate}\": expected Type.field")]
    InvalidCoordinate { coordinate: String },

    #[error("{kind} needs at least one {what}")]
    Empty {
        kind: &'static str,
        what: &'static str,
    },
}

/// Errors loading schemas, documents and JSON inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
