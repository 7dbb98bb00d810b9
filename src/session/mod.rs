//! Session state: one open document and its generated artifacts.
//!
//! Thin orchestration over the analyzer and generator. The session owns the
//! value-like aggregates (pages, chapters, lessons); persistence of the
//! whole session is an external concern and everything here serializes
//! cleanly for it.

use crate::analyze;
use crate::content::model::{
    AiCorrection, BlockKind, Chapter, FeedbackItem, InteractiveBlock, InteractiveContent,
    PageText, fresh_id,
};
use crate::error::PipelineError;
use crate::llm::{ModelClient, RetryPolicy};

/// One open document: its extracted pages and analyzed outline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StudySession {
    pub id: String,
    pub title: String,
    /// Page-indexed text, produced once by external extraction, immutable.
    pub pages: Vec<PageText>,
    /// Chapter outline; empty until `analyze_structure` runs.
    pub chapters: Vec<Chapter>,
}

impl StudySession {
    /// Open a session over extracted page text.
    pub fn new(title: impl Into<String>, pages: Vec<PageText>) -> Self {
        Self {
            id: fresh_id("session"),
            title: title.into(),
            pages,
            chapters: Vec::new(),
        }
    }

    /// Total page count of the document.
    pub fn total_pages(&self) -> u32 {
        self.pages
            .last()
            .map(|p| p.page_number.max(self.pages.len() as u32))
            .unwrap_or(0)
    }

    /// Plain concatenated text of the pages in an inclusive range.
    pub fn range_text(&self, start_page: u32, end_page: u32) -> String {
        self.pages
            .iter()
            .filter(|p| p.page_number >= start_page && p.page_number <= end_page)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The pages in an inclusive range, for page-tagged prompt building.
    pub fn range_pages(&self, start_page: u32, end_page: u32) -> Vec<PageText> {
        self.pages
            .iter()
            .filter(|p| p.page_number >= start_page && p.page_number <= end_page)
            .cloned()
            .collect()
    }

    /// Analyze document structure and store the outline on the session.
    pub fn analyze_structure(
        &mut self,
        client: &dyn ModelClient,
        policy: RetryPolicy,
    ) -> &[Chapter] {
        self.chapters = analyze::analyze_document_structure(client, policy, &self.pages);
        &self.chapters
    }

    /// Lazily populate one chapter's lessons.
    ///
    /// Sets the chapter's `is_analyzing` flag while the call is in flight
    /// and clears it on every exit path. Stores the lessons in place and
    /// returns how many were found; an unknown chapter id is `NotFound`.
    pub fn analyze_lessons(
        &mut self,
        client: &dyn ModelClient,
        policy: RetryPolicy,
        chapter_id: &str,
    ) -> Result<usize, PipelineError> {
        let Some(index) = self.chapters.iter().position(|c| c.id == chapter_id) else {
            return Err(PipelineError::NotFound {
                what: "chapter",
                id: chapter_id.to_string(),
            });
        };

        let chapter = self.chapters[index].clone();
        let text = self.range_text(chapter.start_page, chapter.end_page);

        self.chapters[index].is_analyzing = true;
        let result = analyze::analyze_chapter_for_lessons(client, policy, &text, &chapter);
        self.chapters[index].is_analyzing = false;

        let lessons = result?;
        let count = lessons.len();
        self.chapters[index].lessons = Some(lessons);
        Ok(count)
    }
}

/// Attach remedial corrections to their feedback items by question id.
///
/// Feedback items without a matching correction are left untouched.
pub fn apply_corrections(feedback: &mut [FeedbackItem], corrections: &[AiCorrection]) {
    for item in feedback.iter_mut() {
        if let Some(found) = corrections.iter().find(|c| c.question_id == item.question_id) {
            item.correction = Some(found.correction.clone());
        }
    }
}

/// Splice a deeper explanation right after its source block.
///
/// The new block gets a fresh id. Returns `false` without modifying the
/// sequence when `block_id` is not present — the splice point must exist.
pub fn splice_deeper_explanation(
    content: &mut InteractiveContent,
    block_id: &str,
    text: &str,
) -> bool {
    match content.blocks.iter().position(|b| b.id == block_id) {
        Some(index) => {
            content.blocks.insert(
                index + 1,
                InteractiveBlock::new(BlockKind::Explanation { text: text.into() }),
            );
            true
        }
        None => false,
    }
}
