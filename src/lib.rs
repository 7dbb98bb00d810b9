//! # lectern
//!
//! Study-assistant content engine: turns page-indexed document text into a
//! typed tree of chapters, lessons, and interactive learning blocks by way
//! of a generative-model service that returns unreliable free text.
//!
//! ## Architecture
//!
//! - **Model client** (`llm`): injectable [`llm::ModelClient`] seam plus
//!   bounded retry with increasing backoff for transient server faults
//! - **Sanitizer** (`extract`): recovers a JSON payload from prose- or
//!   fence-wrapped model responses, repairing known defect classes
//! - **Content model** (`content`): strict typed content tree; normalization
//!   reassigns ids, drops unknown variants, and reconciles page ranges
//! - **Analyzer** (`analyze`): non-overlapping chapter outline with a
//!   deterministic whole-document fallback, plus per-chapter lesson outlines
//! - **Generator** (`generate`): explanation/formula blocks, four question
//!   kinds, uniform model-judged grading, and remedial corrections
//! - **Session** (`session`): thin orchestration over one open document
//!
//! ## Library usage
//!
//! ```no_run
//! use lectern::content::model::PageText;
//! use lectern::llm::{OllamaClient, OllamaConfig, RetryPolicy};
//! use lectern::session::StudySession;
//!
//! let client = OllamaClient::connect(OllamaConfig::default()).unwrap();
//! let pages = vec![PageText { page_number: 1, text: "Newton's laws...".into() }];
//! let mut session = StudySession::new("Mechanics", pages);
//! session.analyze_structure(&client, RetryPolicy::default());
//! ```

pub mod analyze;
pub mod content;
pub mod error;
pub mod extract;
pub mod generate;
pub mod llm;
pub mod prompt;
pub mod session;

pub use error::{LecternError, LecternResult, PipelineError};
