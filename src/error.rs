//! Error types for dispatch and view composition.
//!
//! Every failure raised while routing a request, running a controller action or
//! composing a view is a variant of [`Error`]. Variants propagate unchanged up to
//! the [`Engine`](crate::engine::Engine) boundary, which is the only place that
//! turns them into an HTTP status.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Boxed failure raised by application code inside a controller action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for FastTrack.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to find the route named {name} in the routes table")]
    RouteNotFound { name: String },

    #[error("route {name} has an invalid pattern: {source}")]
    InvalidRoutePattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("{url} doesn't match the direct action call protocol ({prefix}Namespace/Controller.method)")]
    MalformedActionUrl { url: String, prefix: String },

    #[error("{name} is not a registered controller")]
    NotAController { name: String },

    #[error("controller {controller} doesn't contain the action {action}")]
    ActionNotFound { controller: String, action: String },

    #[error("action {controller}.{action} doesn't accept direct action calls")]
    ActionNotAllowed { controller: String, action: String },

    #[error("suspicious value detected ({label})")]
    SuspiciousInputDetected { label: String },

    #[error("unable to find the view file {}", .path.display())]
    ViewFileNotFound { path: PathBuf },

    #[error("unable to read the view file {}: {source}", .path.display())]
    ViewIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to start block {requested}: capture of block {active} is in progress")]
    NestedCaptureNotAllowed { active: String, requested: String },

    #[error("no content block capture is in progress")]
    NoCaptureInProgress,

    #[error("block {name} in {} is never closed", .path.display())]
    UnterminatedBlock { name: String, path: PathBuf },

    #[error("view inheritance cycle: {}", Chain(.chain))]
    ViewInheritanceCycle { chain: Vec<PathBuf> },

    #[error("syntax error in {} at line {line}: {message}", .path.display())]
    TemplateSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("undefined view variable {name} in {}", .path.display())]
    UndefinedVariable { name: String, path: PathBuf },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    Action(#[source] BoxError),
}

impl Error {
    /// Wrap an application failure so a controller action can return it with `?`.
    pub fn action(err: impl Into<BoxError>) -> Self {
        Error::Action(err.into())
    }
}

/// Result type alias for FastTrack.
pub type Result<T> = std::result::Result<T, Error>;

// Renders an ancestor chain as `a -> b -> a`.
struct Chain<'a>(&'a [PathBuf]);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}
