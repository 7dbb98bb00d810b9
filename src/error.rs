//! Rich diagnostic error types for the lectern pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text. Malformed model output is
//! deliberately *not* represented as a panic anywhere: it is an expected
//! occurrence given a generative, non-deterministic upstream.

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::LlmError;

/// Top-level error type for the lectern engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum LecternError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Errors from the analysis and generation pipeline.
///
/// "Nothing found" is never an error — operations that can legitimately come
/// up empty return empty collections. An `Err` always means the operation
/// itself broke: the transport failed after retries, the model output could
/// not be coerced, or the caller passed nothing to work on.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("model returned malformed output for {operation}")]
    #[diagnostic(
        code(lectern::pipeline::malformed),
        help(
            "The model response could not be coerced into the expected shape. \
             This is a known failure mode of a generative upstream; re-run the \
             operation or reduce the input size."
        )
    )]
    Malformed { operation: &'static str },

    #[error("no input text for {operation}")]
    #[diagnostic(
        code(lectern::pipeline::empty_input),
        help(
            "The operation was invoked with empty input, so no remote call was \
             made. Extract page text from the document before running the pipeline."
        )
    )]
    EmptyInput { operation: &'static str },

    #[error("{what} not found: \"{id}\"")]
    #[diagnostic(
        code(lectern::pipeline::not_found),
        help(
            "No entity with this id exists in the session. Ids are assigned at \
             normalization time; use the ids carried by the returned structures."
        )
    )]
    NotFound { what: &'static str, id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),
}

/// Convenience alias for functions returning lectern results.
pub type LecternResult<T> = std::result::Result<T, LecternError>;
