//! Semantic tagging of chunks via the chat model
//!
//! Tags are requested as a JSON object, then normalized against a small
//! synonym table so "citrusy" and "citrus" land on the same value.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::types::{ChatMessage, Metadata};

/// Fields the tagger may set on a record's metadata
pub const TAG_FIELDS: [&str; 7] = [
    "technique",
    "flavour",
    "ingredient",
    "category",
    "process",
    "skill_level",
    "discipline",
];

const TAG_SYNONYMS: &[(&str, &str)] = &[
    ("citrusy", "citrus"),
    ("green apple", "green-fruit"),
    ("herbal", "herbaceous"),
    ("savoury", "umami"),
    ("floral notes", "floral"),
    ("fruity", "fruit"),
    ("earthy", "earth"),
    ("mushroomy", "earth"),
    ("meaty", "umami"),
];

/// Characters of chunk text sent for tagging
const TAG_INPUT_CHARS: usize = 1000;

const TAGGING_PROMPT: &str = "You are a semantic tagging assistant for a cocktail R&D knowledge base. \
Given a chunk of cocktail text, return structured tags. \
Use JSON format with optional fields: technique, flavour, ingredient, category, process, skill_level, discipline. \
Only include fields that are relevant. Respond with the JSON object only.";

/// Lower-case, trim, and map through the synonym table
pub fn normalize(tag: &str) -> String {
    let base = tag.trim().to_lowercase();
    TAG_SYNONYMS
        .iter()
        .find(|(from, _)| *from == base)
        .map(|(_, to)| to.to_string())
        .unwrap_or(base)
}

/// Normalize and deduplicate, keeping first occurrence order
pub fn normalize_all<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = normalize(tag.as_ref());
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn code_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").ok())
        .as_ref()
}

/// Parse a model reply into tag metadata. Unknown fields and non-string
/// values are dropped.
pub fn parse_tags(raw: &str) -> Result<Metadata> {
    let trimmed = raw.trim();
    let body = code_fence()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let parsed: Value = serde_json::from_str(body)?;
    let Value::Object(object) = parsed else {
        return Err(Error::internal("tagging reply is not a JSON object"));
    };

    let mut tags = Metadata::new();
    for field in TAG_FIELDS {
        let value = match object.get(field) {
            Some(Value::String(s)) => {
                let tag = normalize(s);
                if tag.is_empty() {
                    continue;
                }
                Value::from(tag)
            }
            Some(Value::Array(items)) => {
                let tags = normalize_all(items.iter().filter_map(Value::as_str));
                if tags.is_empty() {
                    continue;
                }
                Value::from(tags)
            }
            _ => continue,
        };
        tags.insert(field.to_string(), value);
    }
    Ok(tags)
}

/// Asks the chat model for tags, one chunk at a time
#[derive(Clone)]
pub struct ChunkTagger {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl ChunkTagger {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Tags for one chunk of text
    pub async fn tag(&self, text: &str) -> Result<Metadata> {
        let excerpt: String = text.chars().take(TAG_INPUT_CHARS).collect();
        let messages = [
            ChatMessage::system(TAGGING_PROMPT),
            ChatMessage::user(format!("Chunk:\n{}", excerpt)),
        ];
        let reply = self.llm.complete(&messages, self.temperature).await?;
        parse_tags(&reply)
    }

    /// Like [`tag`](Self::tag), but a failure is logged and yields no tags
    pub async fn tag_or_empty(&self, id: &str, text: &str) -> Metadata {
        match self.tag(text).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(chunk = id, "Tagging failed, indexing without tags: {}", e);
                Metadata::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::ScriptedLlm;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Citrusy "), "citrus");
        assert_eq!(normalize("Mushroomy"), "earth");
        assert_eq!(normalize("Smoky"), "smoky");
    }

    #[test]
    fn test_normalize_all_dedups() {
        let tags = normalize_all(["Earthy", "earth", "Fruity", "mushroomy", "  "]);
        assert_eq!(tags, vec!["earth", "fruit"]);
    }

    #[test]
    fn test_parse_tags_fenced() {
        let raw = "```json\n{\"flavour\": [\"Citrusy\", \"herbal\", \"citrus\"], \
                   \"technique\": \"Fat-Washing\", \"rating\": 5, \"skill_level\": 3}\n```";
        let tags = parse_tags(raw).unwrap();

        assert_eq!(tags["flavour"], serde_json::json!(["citrus", "herbaceous"]));
        assert_eq!(tags["technique"], serde_json::json!("fat-washing"));
        assert!(!tags.contains_key("rating"));
        assert!(!tags.contains_key("skill_level"));
    }

    #[test]
    fn test_parse_tags_rejects_non_object() {
        assert!(parse_tags("[1, 2]").is_err());
        assert!(parse_tags("no tags here").is_err());
    }

    #[tokio::test]
    async fn test_tagger_failure_yields_empty() {
        let llm = Arc::new(ScriptedLlm::failing());
        let tagger = ChunkTagger::new(llm.clone(), 0.2);
        let tags = tagger.tag_or_empty("doc_0", "Shake with ice").await;
        assert!(tags.is_empty());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_tagger_truncates_input() {
        let llm = Arc::new(ScriptedLlm::replying(r#"{"category": "Sour"}"#));
        let tagger = ChunkTagger::new(llm.clone(), 0.2);
        let tags = tagger.tag(&"x".repeat(5000)).await.unwrap();

        assert_eq!(tags["category"], serde_json::json!("sour"));
        let prompt = llm.last_messages();
        assert_eq!(prompt[1].content.len(), "Chunk:\n".len() + 1000);
    }
}
