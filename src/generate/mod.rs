//! Interactive content generation: explanations, questions, grading, and
//! remedial corrections.
//!
//! Every operation goes through the transport retry (`llm::with_retry`) and
//! the sanitizer (`crate::extract`) independently. Failure signalling is
//! uniform: hard failure is `Err`, "nothing found" is an empty collection,
//! and no fallback content is ever fabricated — generating fake lesson
//! material would be worse than failing visibly.

use serde::Deserialize;

use crate::content::model::{
    AiCorrection, AnswerValue, BlockKind, FeedbackItem, InteractiveBlock, InteractiveContent,
    PageText, SearchResult, SmartSearchResult, UserAnswer,
};
use crate::content::normalize;
use crate::error::PipelineError;
use crate::extract;
use crate::llm::{ModelClient, ModelRequest, RetryPolicy, with_retry};
use crate::prompt;
use crate::prompt::GradingItem;

/// Identical-prompt resubmissions on malformed question output.
///
/// This is the second retry mechanism, distinct from the transport retry:
/// it answers generation variance, not infrastructure faults. Question
/// batches are the highest-value, highest-failure-rate call, so they alone
/// get it.
const PARSE_ATTEMPTS: u32 = 3;

/// Generate the explanation/formula block sequence for one lesson.
///
/// Only `explanation` and `math_formula` blocks survive; any questions the
/// model volunteers are filtered out. Input text is bounded to a fixed
/// character cap with a visible truncation marker. Parse failure is
/// `Err(Malformed)`; empty input short-circuits to `Err(EmptyInput)`
/// without a remote call.
pub fn generate_interactive_lesson(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    title: &str,
    pages: &[PageText],
) -> Result<InteractiveContent, PipelineError> {
    let text = prompt::page_tagged_text(pages, prompt::PROMPT_CHAR_CAP);
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyInput {
            operation: "interactive lesson",
        });
    }

    let request = ModelRequest::new(prompt::interactive_lesson(title, &text)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    let Some(value) = extract::extract_value(&response) else {
        return Err(PipelineError::Malformed {
            operation: "interactive lesson",
        });
    };
    let mut content = normalize::normalize_interactive_content(&value, title);
    content.blocks.retain(|block| !block.kind.is_question());

    if content.blocks.is_empty() {
        return Err(PipelineError::Malformed {
            operation: "interactive lesson",
        });
    }
    Ok(content)
}

/// Generate the initial question batch for a lesson text.
///
/// Retries the identical prompt up to three times on parse failure, with
/// increasing delay between attempts; three unparseable responses yield
/// `Err(Malformed)`, not a panic. Empty input short-circuits to
/// `Ok(vec![])` without a remote call.
pub fn generate_initial_questions(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    text: &str,
) -> Result<Vec<InteractiveBlock>, PipelineError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let bounded = prompt::truncate_with_marker(text.to_string(), prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::initial_questions(&bounded)).as_json();

    for attempt in 1..=PARSE_ATTEMPTS {
        let response = with_retry(policy, || client.generate(&request))?;
        if let Some(value) = extract::extract_value(&response) {
            let mut blocks = normalize::normalize_blocks(&value);
            blocks.retain(|block| block.kind.is_question());
            return Ok(blocks);
        }
        tracing::warn!(attempt, "question batch did not parse");
        if attempt < PARSE_ATTEMPTS {
            std::thread::sleep(policy.delay_for(attempt));
        }
    }
    Err(PipelineError::Malformed {
        operation: "question generation",
    })
}

/// Generate additional questions, steering away from existing prompts.
///
/// Existing question texts are embedded in the request; duplicates are
/// discouraged, not a computed invariant. Single parse attempt.
pub fn generate_more_questions(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    text: &str,
    existing: &[InteractiveBlock],
) -> Result<Vec<InteractiveBlock>, PipelineError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let seen: Vec<String> = existing
        .iter()
        .filter_map(InteractiveBlock::question_text)
        .collect();
    let bounded = prompt::truncate_with_marker(text.to_string(), prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::more_questions(&bounded, &seen)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    let Some(value) = extract::extract_value(&response) else {
        return Err(PipelineError::Malformed {
            operation: "question generation",
        });
    };
    let mut blocks = normalize::normalize_blocks(&value);
    blocks.retain(|block| block.kind.is_question());
    Ok(blocks)
}

/// Grade submitted answers through a uniform model-judged path.
///
/// Answers referencing unknown question ids, or whose value shape does not
/// match the question variant, are dropped. The model's verdict is trusted
/// for `is_correct` and `explanation` — objective types are deliberately
/// not graded locally, trading determinism for one judging path. Nothing
/// gradable short-circuits to `Ok(vec![])` without a remote call.
pub fn feedback_on_answers(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    answers: &[UserAnswer],
    blocks: &[InteractiveBlock],
) -> Result<Vec<FeedbackItem>, PipelineError> {
    let items: Vec<GradingItem> = answers
        .iter()
        .filter_map(|answer| {
            let block = blocks.iter().find(|b| b.id == answer.question_id)?;
            render_answer(block, &answer.answer)
        })
        .collect();
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let request = ModelRequest::new(prompt::grade_answers(&items)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    let Some(value) = extract::extract_value(&response) else {
        return Err(PipelineError::Malformed {
            operation: "answer grading",
        });
    };

    // Keep only verdicts for questions we actually submitted, and carry the
    // renderings the judge was shown so the caller can display them.
    let feedback = normalize::normalize_feedback(&value)
        .into_iter()
        .filter_map(|mut item| {
            let graded = items.iter().find(|g| g.question_id == item.question_id)?;
            item.question = Some(graded.question.clone());
            item.user_answer = Some(graded.user_answer.clone());
            item.correct_answer = Some(graded.correct_answer.clone());
            Some(item)
        })
        .collect();
    Ok(feedback)
}

/// Request a deeper remedial explanation for each incorrect feedback item.
///
/// Items marked correct are ignored. An empty input short-circuits to
/// `Ok(vec![])`; corrections for unknown question ids are dropped.
pub fn ai_corrections(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    feedback: &[FeedbackItem],
) -> Result<Vec<AiCorrection>, PipelineError> {
    let items: Vec<GradingItem> = feedback
        .iter()
        .filter(|item| !item.is_correct)
        .map(|item| GradingItem {
            question_id: item.question_id.clone(),
            question: item.question.clone().unwrap_or_default(),
            user_answer: item.user_answer.clone().unwrap_or_default(),
            correct_answer: item.correct_answer.clone().unwrap_or_default(),
        })
        .collect();
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let request = ModelRequest::new(prompt::remedial_corrections(&items)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    let Some(value) = extract::extract_value(&response) else {
        return Err(PipelineError::Malformed {
            operation: "remedial corrections",
        });
    };
    let corrections = normalize::normalize_corrections(&value)
        .into_iter()
        .filter(|c| items.iter().any(|g| g.question_id == c.question_id))
        .collect();
    Ok(corrections)
}

/// Single-shot elaboration of one explanation block's text.
///
/// Plain text in, plain text out. Failure signalling follows the crate
/// convention: `Err`, never an apology string — user-facing wording is the
/// presentation layer's concern.
pub fn deeper_explanation(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    text: &str,
) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyInput {
            operation: "deeper explanation",
        });
    }

    let request = ModelRequest::new(prompt::deeper_explanation(text));
    let response = with_retry(policy, || client.generate(&request))?;
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Malformed {
            operation: "deeper explanation",
        });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSmartSearch {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    supporting_quotes: Vec<String>,
}

/// Answer a search query over the document, citing source pages.
///
/// An empty answer with no sources means "the document does not say";
/// that is distinct from `Err`, which means the call itself broke.
pub fn search_document(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    query: &str,
    pages: &[PageText],
) -> Result<SearchResult, PipelineError> {
    if query.trim().is_empty() || pages.is_empty() {
        return Ok(SearchResult {
            answer: String::new(),
            sources: Vec::new(),
        });
    }

    let text = prompt::page_tagged_text(pages, prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::search_document(query, &text)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    match extract::extract_structured::<RawSearch>(&response) {
        Some(raw) => Ok(SearchResult {
            answer: raw.answer,
            sources: raw.sources,
        }),
        None => Err(PipelineError::Malformed {
            operation: "document search",
        }),
    }
}

/// Answer a question over the document with verbatim supporting quotes.
pub fn smart_search(
    client: &dyn ModelClient,
    policy: RetryPolicy,
    query: &str,
    pages: &[PageText],
) -> Result<SmartSearchResult, PipelineError> {
    if query.trim().is_empty() || pages.is_empty() {
        return Ok(SmartSearchResult {
            answer: String::new(),
            supporting_quotes: Vec::new(),
        });
    }

    let text = prompt::page_tagged_text(pages, prompt::PROMPT_CHAR_CAP);
    let request = ModelRequest::new(prompt::smart_search(query, &text)).as_json();
    let response = with_retry(policy, || client.generate(&request))?;

    match extract::extract_structured::<RawSmartSearch>(&response) {
        Some(raw) => Ok(SmartSearchResult {
            answer: raw.answer,
            supporting_quotes: raw.supporting_quotes,
        }),
        None => Err(PipelineError::Malformed {
            operation: "smart search",
        }),
    }
}

/// Render "what the user answered" vs. "what is correct" for one question,
/// in model-agnostic text. Returns `None` when the answer's value shape
/// does not match the question variant.
fn render_answer(block: &InteractiveBlock, value: &AnswerValue) -> Option<GradingItem> {
    let question = block.question_text()?;
    let (user_answer, correct_answer) = match (&block.kind, value) {
        (
            BlockKind::MultipleChoiceQuestion {
                options,
                correct_answer_index,
                ..
            },
            AnswerValue::Choice(chosen),
        ) => {
            let user = options
                .get(*chosen)
                .cloned()
                .unwrap_or_else(|| format!("(invalid choice {chosen})"));
            // The index is in range after normalization.
            let correct = options.get(*correct_answer_index).cloned()?;
            (user, correct)
        }
        (BlockKind::TrueFalseQuestion { correct_answer, .. }, AnswerValue::Bool(answered)) => {
            (render_bool(*answered), render_bool(*correct_answer))
        }
        (
            BlockKind::FillInTheBlankQuestion {
                correct_answers, ..
            },
            AnswerValue::Blanks(filled),
        ) => (filled.join(", "), correct_answers.join(", ")),
        (BlockKind::OpenEndedQuestion { .. }, AnswerValue::Text(answered)) => (
            answered.clone(),
            "(open-ended; judge the substance)".to_string(),
        ),
        _ => return None,
    };
    Some(GradingItem {
        question_id: block.id.clone(),
        question,
        user_answer,
        correct_answer,
    })
}

fn render_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelClient for ScriptedClient {
        fn generate(&self, _request: &ModelRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::immediate(3)
    }

    fn mcq(id: &str, options: &[&str], correct: usize) -> InteractiveBlock {
        InteractiveBlock {
            id: id.into(),
            kind: BlockKind::MultipleChoiceQuestion {
                question: "Which planet is largest?".into(),
                options: options.iter().map(|s| s.to_string()).collect(),
                correct_answer_index: correct,
            },
        }
    }

    #[test]
    fn lesson_keeps_only_explanations_and_formulas() {
        let client = ScriptedClient::new(vec![Ok(r#"{
            "title": "Gravity",
            "content": [
                {"type": "explanation", "text": "Masses attract."},
                {"type": "open_ended_question", "question": "sneaky"},
                {"type": "math_formula", "latex": "F = G m_1 m_2 / r^2"}
            ]
        }"#
        .into())]);
        let pages = vec![PageText {
            page_number: 1,
            text: "gravity text".into(),
        }];
        let content = generate_interactive_lesson(&client, policy(), "Gravity", &pages).unwrap();
        assert_eq!(content.title, "Gravity");
        assert_eq!(content.blocks.len(), 2);
        assert!(content.blocks.iter().all(|b| !b.kind.is_question()));
    }

    #[test]
    fn lesson_parse_failure_is_an_error_not_fabricated_content() {
        let client = ScriptedClient::new(vec![Ok("sorry, I can't do that".into())]);
        let pages = vec![PageText {
            page_number: 1,
            text: "text".into(),
        }];
        let result = generate_interactive_lesson(&client, policy(), "T", &pages);
        assert!(matches!(result, Err(PipelineError::Malformed { .. })));
    }

    #[test]
    fn lesson_with_no_pages_never_contacts_the_model() {
        let client = ScriptedClient::new(vec![]);
        let result = generate_interactive_lesson(&client, policy(), "T", &[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput { .. })));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn three_unparseable_question_batches_fail_after_exactly_three_attempts() {
        let client = ScriptedClient::new(vec![
            Ok("garbage one".into()),
            Ok("garbage two".into()),
            Ok("garbage three".into()),
        ]);
        let result = generate_initial_questions(&client, policy(), "lesson text");
        assert!(matches!(result, Err(PipelineError::Malformed { .. })));
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn question_batch_parses_on_second_attempt() {
        let client = ScriptedClient::new(vec![
            Ok("not json".into()),
            Ok(r#"[{"type":"true_false_question","question":"Is water wet?","correctAnswer":true}]"#.into()),
        ]);
        let questions = generate_initial_questions(&client, policy(), "text").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn non_question_blocks_are_filtered_from_question_batches() {
        let client = ScriptedClient::new(vec![Ok(r#"[
            {"type": "explanation", "text": "not a question"},
            {"type": "open_ended_question", "question": "Why?"}
        ]"#
        .into())]);
        let questions = generate_initial_questions(&client, policy(), "text").unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].kind.is_question());
    }

    #[test]
    fn more_questions_requests_embed_existing_prompts() {
        let existing = vec![InteractiveBlock {
            id: "q-1".into(),
            kind: BlockKind::OpenEndedQuestion {
                question: "What is inertia?".into(),
            },
        }];
        // Inspect the outgoing prompt via a capturing client.
        struct Capture(Mutex<String>);
        impl ModelClient for Capture {
            fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
                *self.0.lock().unwrap() = request.prompt.clone();
                Ok("[]".into())
            }
        }
        let client = Capture(Mutex::new(String::new()));
        let result = generate_more_questions(&client, policy(), "text", &existing).unwrap();
        assert!(result.is_empty());
        assert!(client.0.lock().unwrap().contains("What is inertia?"));
    }

    #[test]
    fn wrong_choice_yields_incorrect_feedback_with_the_right_option_named() {
        let blocks = vec![mcq("q-7", &["Mercury", "Venus", "Jupiter"], 2)];
        let answers = vec![UserAnswer {
            question_id: "q-7".into(),
            answer: AnswerValue::Choice(1),
        }];
        let client = ScriptedClient::new(vec![Ok(r#"[
            {"questionId": "q-7", "isCorrect": false,
             "explanation": "Not quite — the largest planet is Jupiter."}
        ]"#
        .into())]);
        let feedback = feedback_on_answers(&client, policy(), &answers, &blocks).unwrap();
        assert_eq!(feedback.len(), 1);
        assert!(!feedback[0].is_correct);
        assert!(feedback[0].explanation.contains("Jupiter"));
        assert_eq!(feedback[0].user_answer.as_deref(), Some("Venus"));
        assert_eq!(feedback[0].correct_answer.as_deref(), Some("Jupiter"));
    }

    #[test]
    fn answers_for_unknown_questions_are_dropped_before_grading() {
        let blocks = vec![mcq("q-1", &["a", "b"], 0)];
        let answers = vec![UserAnswer {
            question_id: "q-missing".into(),
            answer: AnswerValue::Choice(0),
        }];
        let client = ScriptedClient::new(vec![]);
        let feedback = feedback_on_answers(&client, policy(), &answers, &blocks).unwrap();
        assert!(feedback.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn mismatched_answer_shape_is_dropped() {
        let blocks = vec![mcq("q-1", &["a", "b"], 0)];
        let answers = vec![UserAnswer {
            question_id: "q-1".into(),
            answer: AnswerValue::Text("a".into()),
        }];
        let client = ScriptedClient::new(vec![]);
        let feedback = feedback_on_answers(&client, policy(), &answers, &blocks).unwrap();
        assert!(feedback.is_empty());
    }

    #[test]
    fn corrections_ignore_correct_items_and_unknown_ids() {
        let feedback = vec![
            FeedbackItem {
                question_id: "q-1".into(),
                is_correct: true,
                explanation: "Right.".into(),
                question: Some("?".into()),
                user_answer: Some("a".into()),
                correct_answer: Some("a".into()),
                correction: None,
            },
            FeedbackItem {
                question_id: "q-2".into(),
                is_correct: false,
                explanation: "Wrong.".into(),
                question: Some("??".into()),
                user_answer: Some("b".into()),
                correct_answer: Some("c".into()),
                correction: None,
            },
        ];
        let client = ScriptedClient::new(vec![Ok(r#"[
            {"questionId": "q-2", "correction": "Think of it this way..."},
            {"questionId": "q-unknown", "correction": "noise"}
        ]"#
        .into())]);
        let corrections = ai_corrections(&client, policy(), &feedback).unwrap();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].question_id, "q-2");
    }

    #[test]
    fn all_correct_feedback_needs_no_remote_call() {
        let feedback = vec![FeedbackItem {
            question_id: "q-1".into(),
            is_correct: true,
            explanation: "Right.".into(),
            question: None,
            user_answer: None,
            correct_answer: None,
            correction: None,
        }];
        let client = ScriptedClient::new(vec![]);
        let corrections = ai_corrections(&client, policy(), &feedback).unwrap();
        assert!(corrections.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn deeper_explanation_returns_trimmed_prose() {
        let client = ScriptedClient::new(vec![Ok("  In other words, ...  ".into())]);
        let text = deeper_explanation(&client, policy(), "osmosis").unwrap();
        assert_eq!(text, "In other words, ...");
    }

    #[test]
    fn deeper_explanation_failure_is_an_error_not_an_apology() {
        let client = ScriptedClient::new(vec![Ok("   ".into())]);
        let result = deeper_explanation(&client, policy(), "osmosis");
        assert!(matches!(result, Err(PipelineError::Malformed { .. })));
    }

    #[test]
    fn search_with_empty_query_short_circuits() {
        let client = ScriptedClient::new(vec![]);
        let pages = vec![PageText {
            page_number: 1,
            text: "text".into(),
        }];
        let result = search_document(&client, policy(), "  ", &pages).unwrap();
        assert!(result.answer.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn smart_search_extracts_supporting_quotes() {
        let client = ScriptedClient::new(vec![Ok(r#"{
            "answer": "Entropy never decreases.",
            "supportingQuotes": ["the entropy of an isolated system never decreases"]
        }"#
        .into())]);
        let pages = vec![PageText {
            page_number: 3,
            text: "thermodynamics".into(),
        }];
        let result = smart_search(&client, policy(), "what about entropy?", &pages).unwrap();
        assert_eq!(result.supporting_quotes.len(), 1);
    }
}
