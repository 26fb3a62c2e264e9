//! Response Normalization
//!
//! Extracts the annotated HTML from whatever JSON the service returned. The
//! response shape is not fixed across endpoints, so extraction is a chain of
//! partial parsers tried in priority order. Each one either yields a
//! non-empty trimmed string or abstains; none of them fail on a shape they
//! don't recognise.

use serde_json::Value;

use crate::error::ApiError;

pub const NO_OUTPUT_MESSAGE: &str = "API response did not contain output text.";

/// Top-level fields that carry the output directly, in priority order
const TOP_LEVEL_TEXT_FIELDS: &[&str] = &["output_text", "html", "furigana", "text"];

/// Content entry tags that mark output text
const OUTPUT_TEXT_TAGS: &[&str] = &["output_text", "text"];

type PartialParser = fn(&Value) -> Option<String>;

const OUTPUT_PARSERS: &[PartialParser] = &[top_level_text, output_items_text, choices_text];

/// What normalization found in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Usable output text
    Output(String),
    /// The service declined and said why
    Refused(String),
    /// The service reported an error in the body
    ServiceReported(String),
    /// Nothing usable
    NoOutput,
}

impl Normalized {
    pub fn into_result(self) -> Result<String, ApiError> {
        match self {
            Normalized::Output(text) => Ok(text),
            Normalized::Refused(message) | Normalized::ServiceReported(message) => {
                Err(ApiError::EmptyResponse(message))
            }
            Normalized::NoOutput => Err(ApiError::EmptyResponse(NO_OUTPUT_MESSAGE.to_string())),
        }
    }
}

/// Classify a raw response body
pub fn normalize(raw: &Value) -> Normalized {
    if let Some(text) = extract_output_text(raw) {
        return Normalized::Output(text);
    }
    if let Some(refusal) = extract_refusal_text(raw) {
        return Normalized::Refused(refusal);
    }
    if let Some(error) = extract_error_text(raw) {
        return Normalized::ServiceReported(error);
    }
    Normalized::NoOutput
}

/// First non-empty output text across all known shapes
pub fn extract_output_text(raw: &Value) -> Option<String> {
    OUTPUT_PARSERS.iter().find_map(|parser| parser(raw))
}

/// Refusal text from the first message-like item, if the service declined
pub fn extract_refusal_text(raw: &Value) -> Option<String> {
    if let Some(item) = raw.get("output").and_then(message_item) {
        let refusal = content_entries(item)
            .filter(|entry| tag(entry) == Some("refusal"))
            .find_map(|entry| {
                non_empty(entry.get("refusal")).or_else(|| non_empty(entry.get("text")))
            });
        if refusal.is_some() {
            return refusal;
        }
    }

    first_choice(raw)
        .and_then(|choice| choice.get("message"))
        .and_then(|message| non_empty(message.get("refusal")))
}

/// An explicit top-level error, either a string or an object with a message
pub fn extract_error_text(raw: &Value) -> Option<String> {
    let error = raw.get("error")?;
    non_empty(Some(error)).or_else(|| non_empty(error.get("message")))
}

fn top_level_text(raw: &Value) -> Option<String> {
    TOP_LEVEL_TEXT_FIELDS
        .iter()
        .find_map(|field| non_empty(raw.get(*field)))
}

fn output_items_text(raw: &Value) -> Option<String> {
    let item = raw.get("output").and_then(message_item)?;

    if let Some(text) = non_empty(item.get("content")) {
        return Some(text);
    }

    content_entries(item)
        .filter(|entry| tag(entry).is_some_and(|t| OUTPUT_TEXT_TAGS.contains(&t)))
        .find_map(|entry| non_empty(entry.get("text")))
        .or_else(|| content_entries(item).find_map(|entry| non_empty(entry.get("text"))))
}

fn choices_text(raw: &Value) -> Option<String> {
    let choice = first_choice(raw)?;

    let content = choice.get("message").and_then(|m| m.get("content"));
    let from_message = non_empty(content).or_else(|| {
        content
            .and_then(Value::as_array)
            .and_then(|parts| parts.iter().find_map(|part| non_empty(part.get("text"))))
    });

    from_message.or_else(|| non_empty(choice.get("text")))
}

/// First item tagged "message", or the first item when none is tagged
fn message_item(output: &Value) -> Option<&Value> {
    let items = output.as_array()?;
    items
        .iter()
        .find(|item| tag(item) == Some("message"))
        .or_else(|| items.first())
}

fn first_choice(raw: &Value) -> Option<&Value> {
    raw.get("choices")?.as_array()?.first()
}

fn content_entries(item: &Value) -> impl Iterator<Item = &Value> {
    item.get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn tag(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// A string value, trimmed, or `None` if absent, not a string, or blank
fn non_empty(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
