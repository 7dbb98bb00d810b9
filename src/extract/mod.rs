//! Response sanitizing: recover a JSON payload from free-form model text.
//!
//! Generative models wrap structured answers in prose, code fences, or
//! both, and routinely emit trailing commas. This module slices out the
//! structural core of a response, repairs the known defect classes, and
//! decodes it. It never raises: a response that cannot be recovered is
//! `None`, which callers treat as "generation failed" and answer with
//! their own documented fallback policy.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Trailing commas immediately before a closing brace or bracket.
fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("static pattern compiles"))
}

/// Extract and decode a `T`-shaped JSON payload from raw model text.
///
/// Accepts pure JSON, JSON fenced in a code block, or JSON surrounded by
/// prose. Returns `None` when no structural payload exists or the repaired
/// payload does not decode as `T`.
pub fn extract_structured<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let candidate = isolate_json(raw)?;
    match serde_json::from_str(&candidate) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!("model payload did not decode: {err}");
            None
        }
    }
}

/// Extract the JSON payload as an untyped [`Value`] for manual coercion.
pub fn extract_value(raw: &str) -> Option<Value> {
    extract_structured(raw)
}

/// Slice the structural core out of free-form text and repair it.
///
/// The payload runs from the first `{` or `[` (whichever comes first) to
/// the last `}` or `]` (whichever comes last), inclusive.
fn isolate_json(raw: &str) -> Option<String> {
    let text = unwrap_fence(raw.trim());

    let start = match (text.find('{'), text.find('[')) {
        (Some(obj), Some(arr)) => obj.min(arr),
        (Some(obj), None) => obj,
        (None, Some(arr)) => arr,
        (None, None) => return None,
    };
    let end = match (text.rfind('}'), text.rfind(']')) {
        (Some(obj), Some(arr)) => obj.max(arr),
        (Some(obj), None) => obj,
        (None, Some(arr)) => arr,
        (None, None) => return None,
    };
    if end < start {
        return None;
    }

    let slice = &text[start..=end];
    Some(trailing_comma_re().replace_all(slice, "$1").into_owned())
}

/// Strip a fenced code block (```` ``` ```` or ```` ```json ````) down to
/// its inner content. Text that is not fenced passes through unchanged.
fn unwrap_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", empty, ...) on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(body)
}
