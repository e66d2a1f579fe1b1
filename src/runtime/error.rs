use thiserror::Error;

/// Faults raised while a hosted program is running. These are ordinary
/// results for the host, not control signals: a captured continuation
/// never carries one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("value of type `{type_name}` is not callable")]
    NotCallable { type_name: &'static str },

    #[error("value of type `{type_name}` is not a constructor")]
    NotAConstructor { type_name: &'static str },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("continuation capture is disabled under the fudge transform")]
    CaptureUnsupported,

    #[error("continuation invoked after the runtime was stopped")]
    ContinuationAfterStop,

    #[error("restore expected a construction frame, found `{found}`")]
    BadRestoreFrame { found: &'static str },

    #[error("restore reached an empty frame stack")]
    EmptyRestore,

    #[error("execution was stopped before completion")]
    Interrupted,

    #[error("resume called with no program paused")]
    NotSuspended,
}

/// Faults in runtime bootstrap and option parsing, surfaced before any
/// hosted code runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown transform `{0}` (expected eager, lazy, retval, or fudge)")]
    UnknownTransform(String),

    #[error("unknown estimator `{0}` (expected exact, countdown, reservoir, or velocity)")]
    UnknownEstimator(String),

    #[error("the runtime has already been initialized on this thread")]
    AlreadyInitialized,

    #[error("the runtime has not been initialized on this thread")]
    NotInitialized,
}
