//! Request body strategies
//!
//! The annotation service comes in two flavours: a plain `{ "text" }`
//! endpoint and a prompt-driven model endpoint. Which one is used is a
//! settings choice.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::SourceText;
use crate::config::Settings;

/// Fixed instructions sent with every prompt-format request
pub const SYSTEM_INSTRUCTIONS: &str = "You add furigana to Japanese text. \
Return the input text as HTML, wrapping every word that contains kanji in \
<ruby> with its reading in <rt> written in hiragana. Leave kana, punctuation \
and non-Japanese text unchanged. Respond with the HTML only, no commentary.";

/// Shape of the outbound request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFormat {
    /// `{ "text": <source> }`
    #[default]
    Simple,
    /// System instructions plus the source text as a user turn
    Prompt,
}

impl RequestFormat {
    pub fn build_body(&self, text: &SourceText, settings: &Settings) -> Value {
        match self {
            RequestFormat::Simple => json!({ "text": text.as_str() }),
            RequestFormat::Prompt => json!({
                "model": settings.model,
                "input": [
                    {
                        "role": "system",
                        "content": [{ "type": "input_text", "text": SYSTEM_INSTRUCTIONS }]
                    },
                    {
                        "role": "user",
                        "content": [{ "type": "input_text", "text": text.as_str() }]
                    }
                ]
            }),
        }
    }
}

impl std::fmt::Display for RequestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestFormat::Simple => write!(f, "simple"),
            RequestFormat::Prompt => write!(f, "prompt"),
        }
    }
}

impl std::str::FromStr for RequestFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(RequestFormat::Simple),
            "prompt" => Ok(RequestFormat::Prompt),
            other => Err(format!("unknown request format '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceText {
        SourceText::new(text).expect("non-empty")
    }

    #[test]
    fn test_simple_body() {
        let body = RequestFormat::Simple.build_body(&source("今日"), &Settings::default());
        assert_eq!(body, json!({ "text": "今日" }));
    }

    #[test]
    fn test_prompt_body_carries_model_and_turns() {
        let mut settings = Settings::default();
        settings.model = "test-model".to_string();
        let body = RequestFormat::Prompt.build_body(&source("晴れ"), &settings);

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["input"][0]["role"], "system");
        assert_eq!(body["input"][0]["content"][0]["text"], SYSTEM_INSTRUCTIONS);
        assert_eq!(body["input"][1]["role"], "user");
        assert_eq!(body["input"][1]["content"][0]["text"], "晴れ");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("prompt".parse::<RequestFormat>(), Ok(RequestFormat::Prompt));
        assert_eq!(" Simple ".parse::<RequestFormat>(), Ok(RequestFormat::Simple));
        assert!("xml".parse::<RequestFormat>().is_err());
    }
}
