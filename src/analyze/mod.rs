//! Document structure analysis: page-indexed text → chapter/lesson outline.
//!
//! The model proposes an outline; deterministic code decides what survives.
//! Structure analysis never leaves the caller empty-handed for a non-empty
//! document: any failure — transport, parse, or a zero-chapter outline —
//! degrades to a single synthetic chapter spanning the whole document, so
//! downstream rendering always has a well-formed tree to work with.

use crate::content::model::{Chapter, Lesson, PageText, fresh_id};
use crate::content::normalize;
use crate::error::PipelineError;
use crate::extract;
use crate::llm::{ModelClient, ModelRequest, RetryPolicy, with_retry};
use crate::prompt;

/// Title of the synthetic fallback chapter.
pub const WHOLE_DOCUMENT_TITLE: &str = "Entire document";

/// The synthetic chapter covering pages 1 through `total_pages`.
pub fn whole_document_chapter(total_pages: u32) -> Chapter {
    Chapter {
        id: fresh_id("chapter"),
        title: WHOLE_DOCUMENT_TITLE.into(),
        start_page: 1,
        end_page: total_pages,
        lessons: None,
        is_analyzing: false,
    }
}

/// Infer a non-overlapping, page-indexed chapter outline for a document.
///
/// At most the first [`prompt::STRUCTURE_PAGE_CAP`] pages are considered;
/// pages beyond the cap still count toward the total, so the final
/// chapter's `end_page` covers them. The result is non-empty whenever
/// `pages` is non-empty. An empty page set returns an empty outline
/// without contacting the model.
pub fn analyze_document_structure(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    pages: &[PageText],
) -> Vec<Chapter> {
    let Some(last) = pages.last() else {
        return Vec::new();
    };
    let total_pages = last.page_number.max(pages.len() as u32);

    let bounded = &pages[..pages.len().min(prompt::STRUCTURE_PAGE_CAP)];
    let text = prompt::page_tagged_text(bounded, prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::document_structure(&text, total_pages)).as_json();

    let response = match with_retry(policy, || client.generate(&request)) {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!("structure analysis failed after retries: {err}");
            return vec![whole_document_chapter(total_pages)];
        }
    };

    let chapters = extract::extract_value(&response)
        .map(|value| normalize::normalize_chapters(&value, total_pages))
        .unwrap_or_default();

    if chapters.is_empty() {
        tracing::warn!("model produced no usable outline, falling back to one chapter");
        vec![whole_document_chapter(total_pages)]
    } else {
        chapters
    }
}

/// Infer a lesson outline for one chapter.
///
/// Lesson ranges are constrained to the chapter's page range in the prompt,
/// not re-clamped here, so callers must tolerate inexact endpoints.
/// Distinguishes "nothing found" from "it errored": unparseable output is
/// `Ok(vec![])`, a transport failure after retries is `Err`. Empty chapter
/// text short-circuits to `Ok(vec![])` without contacting the model.
pub fn analyze_chapter_for_lessons(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    chapter_text: &str,
    chapter: &Chapter,
) -> Result<Vec<Lesson>, PipelineError> {
    if chapter_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let bounded = prompt::truncate_with_marker(chapter_text.to_string(), prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::chapter_lessons(&bounded, chapter)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    Ok(extract::extract_value(&response)
        .map(|value| normalize::normalize_lessons(&value, chapter))
        .unwrap_or_default())
}
