//! Built-in text tools available to every agent.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RateLimit, Tool};

pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(WordCount), Arc::new(KeywordExtract::default())]
}

/// Counts words, characters and lines of a text.
pub struct WordCount;

#[async_trait]
impl Tool for WordCount {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count words, characters and lines in a text"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, String> {
        let text = input["text"]
            .as_str()
            .ok_or_else(|| "text must be a string".to_string())?;
        Ok(json!({
            "words": text.split_whitespace().count(),
            "characters": text.chars().count(),
            "lines": text.lines().count(),
        }))
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will", "with",
];

/// Returns the most frequent non-stopword terms of a text.
pub struct KeywordExtract {
    limit: RateLimit,
}

impl Default for KeywordExtract {
    fn default() -> Self {
        Self {
            limit: RateLimit::per_minute(120),
        }
    }
}

#[async_trait]
impl Tool for KeywordExtract {
    fn name(&self) -> &str {
        "keyword_extract"
    }

    fn description(&self) -> &str {
        "Extract the most frequent keywords from a text"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 50 }
            },
            "required": ["text"]
        })
    }

    fn rate_limit(&self) -> Option<RateLimit> {
        Some(self.limit)
    }

    async fn execute(&self, input: Value) -> Result<Value, String> {
        let text = input["text"]
            .as_str()
            .ok_or_else(|| "text must be a string".to_string())?;
        let limit = input["limit"].as_u64().unwrap_or(5) as usize;

        let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
            .map(str::to_lowercase)
        {
            if !stopwords.contains(word.as_str()) {
                *counts.entry(word).or_default() += 1;
            }
        }

        // Highest count first; ties in alphabetical order.
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        Ok(json!({
            "keywords": ranked
                .into_iter()
                .map(|(word, count)| json!({ "word": word, "count": count }))
                .collect::<Vec<_>>()
        }))
    }
}
