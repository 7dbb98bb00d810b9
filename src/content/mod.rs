//! Typed content tree for generated study material.
//!
//! `model` defines the strict data types (chapters, lessons, interactive
//! blocks, answers, feedback); `normalize` coerces untrusted decoded model
//! output into them, reassigning ids and enforcing invariants.

pub mod model;
pub mod normalize;

pub use model::{
    AiCorrection, AnswerValue, BlockKind, Chapter, FeedbackItem, InteractiveBlock,
    InteractiveContent, Lesson, PageText, SearchResult, SmartSearchResult, UserAnswer, fresh_id,
};
pub use normalize::{
    normalize_blocks, normalize_chapters, normalize_corrections, normalize_feedback,
    normalize_interactive_content, normalize_lessons,
};
