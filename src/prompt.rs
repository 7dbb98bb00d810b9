//! Prompt templates and input bounding for every model-facing operation.
//!
//! Prompts state the wire contract (JSON array/object shapes, camelCase
//! field names) and any range constraints; deterministic code downstream
//! still re-checks everything it can (`content::normalize`). Input text is
//! bounded before it reaches a prompt: oversized text is truncated at a
//! fixed character cap with a visible marker, never silently dropped.

use crate::content::model::{Chapter, PageText};

/// Hard cap on pages considered for whole-document structural analysis.
pub const STRUCTURE_PAGE_CAP: usize = 600;

/// Hard cap on characters of page-tagged text embedded in one prompt.
pub const PROMPT_CHAR_CAP: usize = 60_000;

/// Marker appended where prompt text was cut at the cap.
pub const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

/// Concatenate page-tagged text segments, truncated at `cap` characters.
///
/// Truncation is deterministic: the concatenation is cut at the largest
/// char boundary not past `cap` and the visible marker is appended.
pub fn page_tagged_text(pages: &[PageText], cap: usize) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("[Page {}]\n{}\n\n", page.page_number, page.text));
        if out.len() > cap {
            break;
        }
    }
    truncate_with_marker(out, cap)
}

/// Cut `text` at the largest char boundary not past `cap`, appending the
/// visible truncation marker if anything was removed.
pub fn truncate_with_marker(mut text: String, cap: usize) -> String {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(TRUNCATION_MARKER);
    text
}

/// Ask for a flat chapter outline spanning the entire document.
pub fn document_structure(text: &str, total_pages: u32) -> String {
    format!(
        "You are analyzing a {total_pages}-page educational document. \
         Identify its chapters. Return a JSON array of objects with fields: \
         title, startPage, endPage. The chapters together must span the \
         entire document from page 1 to page {total_pages}, in reading \
         order, without overlapping page ranges. \
         Only return the JSON array, no other text.\n\n\
         Document text:\n{text}"
    )
}

/// Ask for a lesson outline scoped to one chapter's page range.
pub fn chapter_lessons(text: &str, chapter: &Chapter) -> String {
    format!(
        "The chapter \"{title}\" of an educational document covers pages \
         {start} to {end}. Divide it into lessons. Return a JSON array of \
         objects with fields: title, startPage, endPage. Every lesson's \
         page range must lie within pages {start} to {end}. If the chapter \
         is too short to divide, return an empty array. \
         Only return the JSON array, no other text.\n\n\
         Chapter text:\n{text}",
        title = chapter.title,
        start = chapter.start_page,
        end = chapter.end_page,
    )
}

/// Ask for explanation and formula blocks for one lesson. No questions.
pub fn interactive_lesson(title: &str, text: &str) -> String {
    format!(
        "Write a structured explanation of the lesson \"{title}\" for a \
         student, based only on the text below. Return a JSON object with \
         fields: title, content. The content field is an ordered array of \
         blocks, each with a \"type\" field that is either \"explanation\" \
         (with a \"text\" field) or \"math_formula\" (with a \"latex\" \
         field). Do not include any questions. \
         Only return the JSON object, no other text.\n\n\
         Lesson text:\n{text}"
    )
}

/// The block-shape contract shared by both question prompts.
const QUESTION_SHAPES: &str = "Each question is an object with a \"type\" field that is one of: \
    \"multiple_choice_question\" (fields: question, options, correctAnswerIndex), \
    \"true_false_question\" (fields: question, correctAnswer), \
    \"fill_in_the_blank_question\" (fields: questionParts, correctAnswers, \
    where the text parts are interleaved with the blanks so there is one \
    more part than answers), \
    \"open_ended_question\" (fields: question).";

/// Ask for an initial batch of questions over the given text.
pub fn initial_questions(text: &str) -> String {
    format!(
        "Create a varied batch of 6 study questions about the text below, \
         mixing the four question types. {QUESTION_SHAPES} \
         Return a JSON array of question objects, no other text.\n\n\
         Text:\n{text}"
    )
}

/// Ask for more questions, steering away from existing prompts.
///
/// Duplicate avoidance is enforced by showing the model what already
/// exists, not by post-hoc dedup: duplicates stay possible, just unlikely.
pub fn more_questions(text: &str, existing: &[String]) -> String {
    let seen = if existing.is_empty() {
        String::from("(none yet)")
    } else {
        existing
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Create 4 additional study questions about the text below, mixing \
         the four question types. Do not repeat or rephrase any of these \
         already-asked questions:\n{seen}\n\n{QUESTION_SHAPES} \
         Return a JSON array of question objects, no other text.\n\n\
         Text:\n{text}"
    )
}

/// One graded item as shown to the judging model.
pub struct GradingItem {
    pub question_id: String,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
}

/// Ask the model to judge a batch of answers and explain each verdict.
pub fn grade_answers(items: &[GradingItem]) -> String {
    let listing = items
        .iter()
        .map(|item| {
            format!(
                "questionId: {}\nquestion: {}\nstudent answered: {}\ncorrect answer: {}",
                item.question_id, item.question, item.user_answer, item.correct_answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!(
        "A student answered the following study questions. For each one, \
         judge whether the student's answer is correct and write a short \
         explanation. When the answer is correct, affirm it and add one \
         reinforcing detail. When it is wrong, gently explain the mistake \
         and state the correct answer. Return a JSON array of objects with \
         fields: questionId, isCorrect, explanation. \
         Only return the JSON array, no other text.\n\n{listing}"
    )
}

/// Ask for a deeper remedial explanation per incorrect item.
pub fn remedial_corrections(items: &[GradingItem]) -> String {
    let listing = items
        .iter()
        .map(|item| {
            format!(
                "questionId: {}\nquestion: {}\nstudent answered: {}\ncorrect answer: {}",
                item.question_id, item.question, item.user_answer, item.correct_answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!(
        "A student got the following questions wrong. For each one, write a \
         deeper remedial explanation that teaches the underlying concept, \
         not just the answer. Return a JSON array of objects with fields: \
         questionId, correction. Only return the JSON array, no other \
         text.\n\n{listing}"
    )
}

/// Ask for an expanded version of one explanation.
pub fn deeper_explanation(text: &str) -> String {
    format!(
        "Expand the following explanation for a student who did not \
         understand it. Go one level deeper: define the terms involved and \
         add a concrete example. Respond with plain text.\n\n{text}"
    )
}

/// Ask for a cited answer to a search query over the document.
pub fn search_document(query: &str, text: &str) -> String {
    format!(
        "Answer the question using only the document text below. Return a \
         JSON object with fields: answer, sources — where sources is an \
         array of strings naming the pages the answer draws on (e.g. \
         \"Page 12\"). If the document does not answer the question, say so \
         in the answer and return an empty sources array. \
         Only return the JSON object, no other text.\n\n\
         Question: {query}\n\nDocument text:\n{text}"
    )
}

/// Ask for an answer backed by verbatim quotes from the document.
pub fn smart_search(query: &str, text: &str) -> String {
    format!(
        "Answer the question using only the document text below. Return a \
         JSON object with fields: answer, supportingQuotes — where \
         supportingQuotes is an array of short verbatim quotes from the \
         document that support the answer. If nothing in the document is \
         relevant, say so in the answer and return an empty array. \
         Only return the JSON object, no other text.\n\n\
         Question: {query}\n\nDocument text:\n{text}"
    )
}
