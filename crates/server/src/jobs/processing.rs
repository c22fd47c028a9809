//! Job processors. Large inputs are split into chunks that run on the
//! blocking pool in parallel and are merged in input order.

use std::{collections::HashSet, time::Instant};

use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::protocol::JobKind;
use thiserror::Error;
use tokio::task::{self, JoinHandle};
use tracing::info;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_CHUNK_SIZE: usize = 1000;
const MAX_TOKENS: usize = 100;
const POSITIVE_WORDS: [&str; 5] = ["good", "great", "excellent", "best", "happy"];
const NEGATIVE_WORDS: [&str; 5] = ["bad", "worst", "poor", "terrible", "sad"];

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
    #[error("worker task failed: {0}")]
    Worker(#[from] task::JoinError),
}

fn yes() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_operations() -> Vec<TextOperation> {
    vec![TextOperation::Count, TextOperation::Tokenize]
}

#[derive(Debug, Deserialize)]
struct DataOptions {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "yes", alias = "use_ray")]
    parallel: bool,
    #[serde(default)]
    operation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TextOperation {
    Count,
    Tokenize,
    Sentiment,
}

#[derive(Debug, Deserialize)]
struct TextOptions {
    #[serde(default = "default_operations")]
    operations: Vec<TextOperation>,
    #[serde(default = "yes", alias = "use_ray")]
    parallel: bool,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

fn options<T: for<'de> Deserialize<'de>>(raw: Value) -> Result<T, ProcessingError> {
    let raw = if raw.is_null() { json!({}) } else { raw };
    Ok(serde_json::from_value(raw)?)
}

pub async fn run(
    kind: JobKind,
    data: Value,
    raw_options: Value,
) -> Result<Value, ProcessingError> {
    match kind {
        JobKind::DataProcessing => process_data(data, options(raw_options)?).await,
        JobKind::TextProcessing => process_text(data, options(raw_options)?).await,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn process_record_chunk(chunk: Vec<(String, Value)>, label: &str) -> Map<String, Value> {
    chunk
        .into_iter()
        .map(|(key, value)| {
            let processed = format!("Processed {label}: {}", describe(&value));
            (key, Value::String(processed))
        })
        .collect()
}

async fn process_data(data: Value, options: DataOptions) -> Result<Value, ProcessingError> {
    let Value::Object(records) = data else {
        return Err(ProcessingError::InvalidInput(
            "data must be a JSON object".into(),
        ));
    };
    let started = Instant::now();
    let items = records.len();
    let label = options.operation.unwrap_or_else(|| "standard".into());

    let results = if options.parallel {
        let entries: Vec<(String, Value)> = records.into_iter().collect();
        let handles: Vec<JoinHandle<Map<String, Value>>> = entries
            .chunks(options.batch_size.max(1))
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let label = label.clone();
                task::spawn_blocking(move || process_record_chunk(chunk, &label))
            })
            .collect();
        info!(items, chunks = handles.len(), "processing data job in parallel");
        let mut merged = Map::new();
        for handle in handles {
            merged.extend(handle.await?);
        }
        merged
    } else {
        process_record_chunk(records.into_iter().collect(), &label)
    };

    Ok(json!({
        "status": "success",
        "processing_time": started.elapsed().as_secs_f64(),
        "items_processed": items,
        "results": results,
    }))
}

#[derive(Debug, Default)]
struct TextStats {
    words: usize,
    chars: usize,
    tokens: Vec<String>,
    positive: usize,
    negative: usize,
}

impl TextStats {
    fn of(chunk: &str) -> Self {
        let tokens: Vec<String> = chunk.split_whitespace().map(str::to_string).collect();
        let (mut positive, mut negative) = (0, 0);
        for token in &tokens {
            let lower = token.to_lowercase();
            if POSITIVE_WORDS.contains(&lower.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&lower.as_str()) {
                negative += 1;
            }
        }
        Self {
            words: tokens.len(),
            chars: chunk.chars().count(),
            tokens,
            positive,
            negative,
        }
    }

    fn merge(&mut self, other: Self) {
        self.words += other.words;
        self.chars += other.chars;
        self.tokens.extend(other.tokens);
        self.positive += other.positive;
        self.negative += other.negative;
    }

    fn report(self, operations: &[TextOperation]) -> Map<String, Value> {
        let mut results = Map::new();
        if operations.contains(&TextOperation::Count) {
            results.insert("word_count".into(), json!(self.words));
            results.insert("char_count".into(), json!(self.chars));
        }
        if operations.contains(&TextOperation::Tokenize) {
            let mut seen = HashSet::new();
            let unique: Vec<String> = self
                .tokens
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| seen.insert(t.clone()))
                .take(MAX_TOKENS)
                .collect();
            let tokens: Vec<&String> = self.tokens.iter().take(MAX_TOKENS).collect();
            results.insert("tokens".into(), json!(tokens));
            results.insert("unique_tokens".into(), json!(unique));
        }
        if operations.contains(&TextOperation::Sentiment) {
            let label = match self.positive.cmp(&self.negative) {
                std::cmp::Ordering::Greater => "positive",
                std::cmp::Ordering::Less => "negative",
                std::cmp::Ordering::Equal => "neutral",
            };
            results.insert(
                "sentiment".into(),
                json!({
                    "label": label,
                    "positive_words": self.positive,
                    "negative_words": self.negative,
                }),
            );
        }
        results
    }
}

/// Splits `text` into chunks of at most `chunk_size` chars, ending each chunk
/// before a whitespace char when one exists inside it. Concatenating the
/// chunks yields `text`.
pub(crate) fn split_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total = chars.len();
    if total <= chunk_size {
        return vec![text];
    }
    let offset = |i: usize| chars.get(i).map_or(text.len(), |(at, _)| *at);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let mut end = (start + chunk_size).min(total);
        if end < total && !chars[end].1.is_whitespace() {
            let mut back = end;
            while back > start && !chars[back].1.is_whitespace() {
                back -= 1;
            }
            if back > start {
                end = back;
            }
        }
        chunks.push(&text[offset(start)..offset(end)]);
        start = end;
    }
    chunks
}

async fn process_text(data: Value, options: TextOptions) -> Result<Value, ProcessingError> {
    let Value::String(text) = data else {
        return Err(ProcessingError::InvalidInput(
            "data must be a JSON string".into(),
        ));
    };
    let started = Instant::now();
    let text_length = text.chars().count();

    let stats = if options.parallel && text_length > options.chunk_size {
        let handles: Vec<JoinHandle<TextStats>> = split_chunks(&text, options.chunk_size)
            .into_iter()
            .map(|chunk| {
                let chunk = chunk.to_string();
                task::spawn_blocking(move || TextStats::of(&chunk))
            })
            .collect();
        info!(text_length, chunks = handles.len(), "processing text job in parallel");
        let mut merged = TextStats::default();
        for handle in handles {
            merged.merge(handle.await?);
        }
        merged
    } else {
        TextStats::of(&text)
    };

    Ok(json!({
        "status": "success",
        "processing_time": started.elapsed().as_secs_f64(),
        "text_length": text_length,
        "results": stats.report(&options.operations),
    }))
}

#[cfg(test)]
#[path = "tests/processing_tests.rs"]
mod tests;
