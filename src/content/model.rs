//! Core data types for generated study content.
//!
//! Everything here is value-like and owned by whichever session or book
//! aggregate holds it; the pipeline receives and returns these by value and
//! keeps no state of its own between calls.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, process-unique identifier with the given prefix.
///
/// Ids present in raw model output are never trusted; every chapter,
/// lesson, and block gets one of these at normalization time.
pub fn fresh_id(prefix: &str) -> String {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{n}")
}

/// Extracted text of one physical page of the source document.
///
/// Produced once by document extraction (external to this crate), ordered
/// by page, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based physical page number.
    pub page_number: u32,
    pub text: String,
}

/// Top-level structural unit of a document, with an inclusive page range.
///
/// Within a sibling list, chapters are ordered by page and non-overlapping;
/// the normalizer enforces both (see `normalize::normalize_chapters`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Populated lazily by a second, narrower analysis call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons: Option<Vec<Lesson>>,
    /// A lesson analysis for this chapter is currently in flight.
    #[serde(default)]
    pub is_analyzing: bool,
}

/// Sub-unit of a chapter, with a narrower inclusive page range.
/// No further nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
}

/// One generated learning unit for a lesson: an ordered block sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveContent {
    pub id: String,
    pub title: String,
    pub blocks: Vec<InteractiveBlock>,
}

/// One unit of generated content with its normalization-assigned id.
///
/// Blocks are immutable after creation except when a new block (e.g. a
/// deeper explanation) is spliced into the owning sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveBlock {
    pub id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl InteractiveBlock {
    /// Wrap a block kind with a fresh id.
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: fresh_id("block"),
            kind,
        }
    }

    /// The question prompt, for question variants.
    pub fn question_text(&self) -> Option<String> {
        match &self.kind {
            BlockKind::MultipleChoiceQuestion { question, .. }
            | BlockKind::TrueFalseQuestion { question, .. }
            | BlockKind::OpenEndedQuestion { question } => Some(question.clone()),
            BlockKind::FillInTheBlankQuestion { question_parts, .. } => {
                Some(question_parts.join(" ___ "))
            }
            BlockKind::Explanation { .. } | BlockKind::MathFormula { .. } => None,
        }
    }
}

/// The tagged content union. Tag names are the wire contract with the
/// model prompts; the four question variants share the `_question` suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Explanation {
        text: String,
    },
    MathFormula {
        latex: String,
    },
    #[serde(rename_all = "camelCase")]
    MultipleChoiceQuestion {
        question: String,
        options: Vec<String>,
        /// Always within `[0, options.len())` after normalization.
        correct_answer_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    TrueFalseQuestion {
        question: String,
        correct_answer: bool,
    },
    /// Blanks are rendered between consecutive parts: the invariant after
    /// normalization is `correct_answers.len() == question_parts.len() - 1`.
    #[serde(rename_all = "camelCase")]
    FillInTheBlankQuestion {
        question_parts: Vec<String>,
        correct_answers: Vec<String>,
    },
    OpenEndedQuestion {
        question: String,
    },
}

impl BlockKind {
    /// The wire tag for this variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Explanation { .. } => "explanation",
            Self::MathFormula { .. } => "math_formula",
            Self::MultipleChoiceQuestion { .. } => "multiple_choice_question",
            Self::TrueFalseQuestion { .. } => "true_false_question",
            Self::FillInTheBlankQuestion { .. } => "fill_in_the_blank_question",
            Self::OpenEndedQuestion { .. } => "open_ended_question",
        }
    }

    /// Question variants are identified by the tag-suffix convention.
    pub fn is_question(&self) -> bool {
        self.tag().ends_with("_question")
    }
}

/// A submitted answer; the value shape depends on the question variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnswer {
    pub question_id: String,
    pub answer: AnswerValue,
}

/// The per-variant answer payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Chosen option index, for multiple choice.
    Choice(usize),
    /// True/false verdict.
    Bool(bool),
    /// Free text, for open-ended questions.
    Text(String),
    /// One entry per blank, for fill-in-the-blank.
    Blanks(Vec<String>),
}

/// Graded outcome for one submitted answer.
///
/// `explanation` is affirming when correct and corrective (naming the right
/// answer) when not. The optional fields carry the textual renderings the
/// grader was shown, so the caller can display them without re-deriving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub question_id: String,
    pub is_correct: bool,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Deeper remedial explanation, attached after an `ai_corrections` pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

/// Deeper remedial explanation for one incorrect item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCorrection {
    pub question_id: String,
    pub correction: String,
}

/// Free-text answer to a document search, with source page references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub answer: String,
    /// Page references or links the answer draws on.
    pub sources: Vec<String>,
}

/// Free-text Q&A answer with verbatim supporting quotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartSearchResult {
    pub answer: String,
    pub supporting_quotes: Vec<String>,
}
