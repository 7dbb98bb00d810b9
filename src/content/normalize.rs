//! Schema normalization: untrusted decoded JSON → the strict content model.
//!
//! Everything the model produces is treated as advice. Ids are always
//! reassigned, unknown block tags are dropped rather than propagated, and
//! chapter page ranges are reconciled deterministically in code — never
//! delegated to the prompt.

use serde::Deserialize;
use serde_json::Value;

use crate::content::model::{
    AiCorrection, BlockKind, Chapter, FeedbackItem, InteractiveBlock, InteractiveContent, Lesson,
    fresh_id,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutlineEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    start_page: i64,
    #[serde(default)]
    end_page: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeedback {
    #[serde(default)]
    question_id: String,
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCorrection {
    #[serde(default)]
    question_id: String,
    #[serde(default)]
    correction: String,
}

#[derive(Debug, Deserialize)]
struct RawInteractiveContent {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: Value,
}

/// Decode every element of a JSON array individually, dropping the ones
/// that do not fit. A non-array input yields nothing.
fn lenient_elements<T: serde::de::DeserializeOwned>(raw: &Value) -> Vec<T> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!("dropping element that does not fit the schema: {err}");
                None
            }
        })
        .collect()
}

/// Coerce a raw outline into a well-formed chapter list.
///
/// - Entries with an empty title, a non-positive or out-of-document
///   `start_page`, or `end_page < start_page` are dropped.
/// - Chapters are sorted by `start_page`; each chapter's end is clamped to
///   just before its successor's start, so siblings never overlap.
/// - The final chapter's `end_page` is forced to `total_pages` regardless
///   of what the model said.
///
/// Returns an empty list for unusable input; the analyzer owns the
/// whole-document fallback.
pub fn normalize_chapters(raw: &Value, total_pages: u32) -> Vec<Chapter> {
    let entries: Vec<RawOutlineEntry> = lenient_elements(raw);

    let mut chapters: Vec<Chapter> = entries
        .into_iter()
        .filter_map(|entry| {
            if entry.title.trim().is_empty() {
                return None;
            }
            if entry.start_page < 1
                || entry.start_page > i64::from(total_pages)
                || entry.end_page < entry.start_page
            {
                tracing::debug!(
                    title = %entry.title,
                    start = entry.start_page,
                    end = entry.end_page,
                    "dropping chapter with unusable page range"
                );
                return None;
            }
            Some(Chapter {
                id: fresh_id("chapter"),
                title: entry.title,
                start_page: entry.start_page as u32,
                end_page: entry.end_page.min(i64::from(total_pages)) as u32,
                lessons: None,
                is_analyzing: false,
            })
        })
        .collect();

    chapters.sort_by_key(|c| c.start_page);

    // Resolve overlap by shrinking the earlier chapter.
    for i in 0..chapters.len().saturating_sub(1) {
        let next_start = chapters[i + 1].start_page;
        if chapters[i].end_page >= next_start {
            chapters[i].end_page = next_start - 1;
        }
    }
    // Shrinking can empty out a chapter entirely (e.g. duplicate starts).
    chapters.retain(|c| c.start_page <= c.end_page);

    if let Some(last) = chapters.last_mut() {
        last.end_page = total_pages;
    }
    chapters
}

/// Coerce a raw outline into lessons for one chapter.
///
/// Lesson endpoints are constrained by the prompt, not re-clamped here, so
/// they may be inexact; only structurally invalid entries (empty title,
/// non-positive start, `end < start`) are dropped.
pub fn normalize_lessons(raw: &Value, _chapter: &Chapter) -> Vec<Lesson> {
    lenient_elements::<RawOutlineEntry>(raw)
        .into_iter()
        .filter_map(|entry| {
            if entry.title.trim().is_empty() || entry.start_page < 1 || entry.end_page < entry.start_page
            {
                return None;
            }
            Some(Lesson {
                id: fresh_id("lesson"),
                title: entry.title,
                start_page: entry.start_page as u32,
                end_page: entry.end_page as u32,
            })
        })
        .collect()
}

/// Coerce a raw block array into typed interactive blocks.
///
/// Unknown `type` tags and schema-violating elements are dropped — a
/// malformed variant would otherwise crash downstream rendering. Each kept
/// block gets a fresh id.
pub fn normalize_blocks(raw: &Value) -> Vec<InteractiveBlock> {
    lenient_elements::<BlockKind>(raw)
        .into_iter()
        .filter_map(coerce_kind)
        .map(InteractiveBlock::new)
        .collect()
}

/// Enforce per-variant invariants, dropping blocks that cannot be saved.
fn coerce_kind(kind: BlockKind) -> Option<BlockKind> {
    match kind {
        BlockKind::MultipleChoiceQuestion {
            question,
            options,
            correct_answer_index,
        } => {
            if options.is_empty() || correct_answer_index >= options.len() {
                tracing::debug!(
                    %question,
                    index = correct_answer_index,
                    options = options.len(),
                    "dropping multiple-choice block with out-of-range answer index"
                );
                return None;
            }
            Some(BlockKind::MultipleChoiceQuestion {
                question,
                options,
                correct_answer_index,
            })
        }
        BlockKind::FillInTheBlankQuestion {
            mut question_parts,
            correct_answers,
        } => {
            if correct_answers.is_empty() {
                return None;
            }
            // Enforce the blank convention: one part before and after each
            // blank, i.e. parts = answers + 1. Short part lists are padded
            // with empty trailing parts; surplus parts are merged into the
            // final one so no text is lost.
            let want = correct_answers.len() + 1;
            while question_parts.len() < want {
                question_parts.push(String::new());
            }
            while question_parts.len() > want {
                if let Some(tail) = question_parts.pop() {
                    if let Some(last) = question_parts.last_mut() {
                        if !tail.is_empty() {
                            if !last.is_empty() {
                                last.push(' ');
                            }
                            last.push_str(&tail);
                        }
                    }
                }
            }
            Some(BlockKind::FillInTheBlankQuestion {
                question_parts,
                correct_answers,
            })
        }
        other => Some(other),
    }
}

/// Coerce a raw lesson payload into [`InteractiveContent`].
///
/// Accepts either `{"title": ..., "content": [...]}` or a bare block
/// array; a missing title falls back to the caller's.
pub fn normalize_interactive_content(raw: &Value, fallback_title: &str) -> InteractiveContent {
    let (title, blocks) = if raw.is_array() {
        (String::new(), normalize_blocks(raw))
    } else {
        match serde_json::from_value::<RawInteractiveContent>(raw.clone()) {
            Ok(outer) => (outer.title, normalize_blocks(&outer.content)),
            Err(_) => (String::new(), Vec::new()),
        }
    };
    InteractiveContent {
        id: fresh_id("content"),
        title: if title.trim().is_empty() {
            fallback_title.to_string()
        } else {
            title
        },
        blocks,
    }
}

/// Coerce raw grading output into feedback items.
///
/// The model's verdict is trusted for `is_correct` and `explanation`; the
/// caller pairs items back to submitted answers and fills the textual
/// renderings.
pub fn normalize_feedback(raw: &Value) -> Vec<FeedbackItem> {
    lenient_elements::<RawFeedback>(raw)
        .into_iter()
        .filter(|f| !f.question_id.is_empty())
        .map(|f| FeedbackItem {
            question_id: f.question_id,
            is_correct: f.is_correct,
            explanation: f.explanation,
            question: None,
            user_answer: None,
            correct_answer: None,
            correction: None,
        })
        .collect()
}

/// Coerce raw remedial output into corrections.
pub fn normalize_corrections(raw: &Value) -> Vec<AiCorrection> {
    lenient_elements::<RawCorrection>(raw)
        .into_iter()
        .filter(|c| !c.question_id.is_empty() && !c.correction.trim().is_empty())
        .map(|c| AiCorrection {
            question_id: c.question_id,
            correction: c.correction,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlap_resolved_by_shrinking_the_earlier_chapter() {
        let raw = json!([
            {"title": "Ch1", "startPage": 1, "endPage": 5},
            {"title": "Ch2", "startPage": 4, "endPage": 10}
        ]);
        let chapters = normalize_chapters(&raw, 10);
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].start_page, chapters[0].end_page), (1, 3));
        assert_eq!((chapters[1].start_page, chapters[1].end_page), (4, 10));
    }

    #[test]
    fn last_chapter_end_is_forced_to_total_pages() {
        let raw = json!([
            {"title": "Only", "startPage": 1, "endPage": 4}
        ]);
        let chapters = normalize_chapters(&raw, 9);
        assert_eq!(chapters[0].end_page, 9);
    }

    #[test]
    fn unusable_ranges_are_dropped() {
        let raw = json!([
            {"title": "Negative", "startPage": -2, "endPage": 3},
            {"title": "Beyond", "startPage": 50, "endPage": 60},
            {"title": "Inverted", "startPage": 5, "endPage": 2},
            {"title": "", "startPage": 1, "endPage": 2},
            {"title": "Good", "startPage": 1, "endPage": 10}
        ]);
        let chapters = normalize_chapters(&raw, 10);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Good");
    }

    #[test]
    fn chapters_are_sorted_by_start_page() {
        let raw = json!([
            {"title": "Second", "startPage": 6, "endPage": 10},
            {"title": "First", "startPage": 1, "endPage": 5}
        ]);
        let chapters = normalize_chapters(&raw, 10);
        assert_eq!(chapters[0].title, "First");
        assert_eq!(chapters[1].title, "Second");
    }

    #[test]
    fn duplicate_start_pages_drop_the_emptied_chapter() {
        let raw = json!([
            {"title": "A", "startPage": 4, "endPage": 6},
            {"title": "B", "startPage": 4, "endPage": 10}
        ]);
        let chapters = normalize_chapters(&raw, 10);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].end_page, 10);
    }

    #[test]
    fn model_supplied_ids_are_ignored() {
        let raw = json!([
            {"id": "model-made-this-up", "title": "Ch", "startPage": 1, "endPage": 3}
        ]);
        let chapters = normalize_chapters(&raw, 3);
        assert!(chapters[0].id.starts_with("chapter-"));
    }

    #[test]
    fn non_array_input_yields_no_chapters() {
        assert!(normalize_chapters(&json!({"oops": true}), 10).is_empty());
        assert!(normalize_chapters(&json!(null), 10).is_empty());
    }

    #[test]
    fn lessons_keep_model_endpoints_as_given() {
        let chapter = Chapter {
            id: "chapter-x".into(),
            title: "Ch".into(),
            start_page: 3,
            end_page: 8,
            lessons: None,
            is_analyzing: false,
        };
        // endPage 9 pokes past the chapter; kept as-is by design.
        let raw = json!([
            {"title": "L1", "startPage": 3, "endPage": 9},
            {"title": "Bad", "startPage": 7, "endPage": 4}
        ]);
        let lessons = normalize_lessons(&raw, &chapter);
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].end_page, 9);
        assert!(lessons[0].id.starts_with("lesson-"));
    }

    #[test]
    fn unknown_block_tags_are_dropped() {
        let raw = json!([
            {"type": "explanation", "text": "Gravity pulls."},
            {"type": "hologram", "text": "??"},
            {"type": "open_ended_question", "question": "Why?"}
        ]);
        let blocks = normalize_blocks(&raw);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind.tag(), "explanation");
        assert_eq!(blocks[1].kind.tag(), "open_ended_question");
    }

    #[test]
    fn out_of_range_choice_index_drops_the_block() {
        let raw = json!([
            {
                "type": "multiple_choice_question",
                "question": "Pick one",
                "options": ["a", "b"],
                "correctAnswerIndex": 2
            }
        ]);
        assert!(normalize_blocks(&raw).is_empty());
    }

    #[test]
    fn fill_in_the_blank_parts_are_padded_to_the_convention() {
        let raw = json!([
            {
                "type": "fill_in_the_blank_question",
                "questionParts": ["The capital of France is"],
                "correctAnswers": ["Paris"]
            }
        ]);
        let blocks = normalize_blocks(&raw);
        let BlockKind::FillInTheBlankQuestion {
            question_parts,
            correct_answers,
        } = &blocks[0].kind
        else {
            panic!("wrong variant");
        };
        assert_eq!(correct_answers.len(), question_parts.len() - 1);
    }

    #[test]
    fn fill_in_the_blank_surplus_parts_are_merged_not_lost() {
        let raw = json!([
            {
                "type": "fill_in_the_blank_question",
                "questionParts": ["A", "B", "C", "D"],
                "correctAnswers": ["x"]
            }
        ]);
        let blocks = normalize_blocks(&raw);
        let BlockKind::FillInTheBlankQuestion { question_parts, .. } = &blocks[0].kind else {
            panic!("wrong variant");
        };
        assert_eq!(question_parts, &vec!["A".to_string(), "B C D".to_string()]);
    }

    #[test]
    fn interactive_content_accepts_bare_arrays_and_wrapped_objects() {
        let bare = json!([{"type": "explanation", "text": "hi"}]);
        let content = normalize_interactive_content(&bare, "Lesson 1");
        assert_eq!(content.title, "Lesson 1");
        assert_eq!(content.blocks.len(), 1);

        let wrapped = json!({
            "title": "Photosynthesis",
            "content": [{"type": "math_formula", "latex": "6CO_2"}]
        });
        let content = normalize_interactive_content(&wrapped, "fallback");
        assert_eq!(content.title, "Photosynthesis");
        assert_eq!(content.blocks[0].kind.tag(), "math_formula");
    }

    #[test]
    fn feedback_items_without_question_id_are_dropped() {
        let raw = json!([
            {"questionId": "q-1", "isCorrect": true, "explanation": "Right."},
            {"isCorrect": false, "explanation": "orphan"}
        ]);
        let feedback = normalize_feedback(&raw);
        assert_eq!(feedback.len(), 1);
        assert!(feedback[0].is_correct);
    }

    #[test]
    fn empty_corrections_are_dropped() {
        let raw = json!([
            {"questionId": "q-1", "correction": "Because mitochondria."},
            {"questionId": "q-2", "correction": "  "}
        ]);
        let corrections = normalize_corrections(&raw);
        assert_eq!(corrections.len(), 1);
    }
}
