//! Error types
//!
//! Every failure in this crate is local and recoverable. Structural graph
//! errors are reported synchronously by [`Canvas`](crate::graph::Canvas)
//! mutations; asynchronous failures travel through [`Late`](crate::late::Late)
//! values as a [`Failure`].

use thiserror::Error;

/// Structural errors raised by connection and module mutations on a canvas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The exact connection already exists
    #[error("these ports are already connected")]
    DoubleConnection,

    /// The destination already has an inbound connection
    #[error("the destination port already has an incoming connection")]
    MultipleConnections,

    /// The connection would close a directed cycle
    #[error("this connection would create a loop")]
    ConnectionLoop,

    /// The module is not part of this canvas
    #[error("the module is not part of this canvas")]
    InvalidModule,

    /// The module has no port of the requested kind with this name
    #[error("the module has no port named '{0}'")]
    InvalidPort(String),
}

/// Discriminant of [`Failure`], used to filter failure continuations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ModuleInstanceCreationFailed,
    TemplateInstallFailed,
    CanvasCreationFailed,
    Abandoned,
}

/// Failure carried by a deferred value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("failed to create an instance of '{template}': {reason}")]
    ModuleInstanceCreationFailed { template: String, reason: String },

    #[error("failed to install template '{template}': {reason}")]
    TemplateInstallFailed { template: String, reason: String },

    #[error("failed to create a canvas: {0}")]
    CanvasCreationFailed(String),

    /// The producer went away without completing the value
    #[error("the operation was abandoned before it completed")]
    Abandoned,
}

impl Failure {
    /// Shorthand for an instance creation failure
    pub fn creation(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Failure::ModuleInstanceCreationFailed {
            template: template.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::ModuleInstanceCreationFailed { .. } => FailureKind::ModuleInstanceCreationFailed,
            Failure::TemplateInstallFailed { .. } => FailureKind::TemplateInstallFailed,
            Failure::CanvasCreationFailed(_) => FailureKind::CanvasCreationFailed,
            Failure::Abandoned => FailureKind::Abandoned,
        }
    }
}

/// A presentation binding could not be built for a module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot build the interface of '{template}': {reason}")]
pub struct GuiBuildError {
    pub template: String,
    pub reason: String,
}

/// Errors raised while parsing or installing template collections
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("while loading collection '{id}': {reason}")]
    Parse { id: String, reason: String },

    #[error("while loading collection from '{path}': {reason}")]
    Loading { path: String, reason: String },

    #[error("a collection with id '{0}' is already installed")]
    DuplicateCollection(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
