//! Commit event filtering and sampling.
//!
//! Jetstream frames are JSON objects. Only the subset below is inspected:
//!
//! ```json
//! { "kind": "commit", "commit": { "operation": "create", "record": { "text": "..." } } }
//! ```
//!
//! Everything else in a frame is ignored and never validated, so a frame with
//! unexpected extra fields (or odd types in fields we do not read) is still
//! sampled. Frames that do not match are dropped without any report: the
//! firehose carries plenty of unrelated traffic.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::random::RandomSource;

const KIND_COMMIT: &str = "commit";
const OPERATION_CREATE: &str = "create";

/// A create commit carrying text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    /// Free text of the created record.
    pub text: String,
    /// Repository DID, when present.
    pub did: Option<String>,
    /// Event time in microseconds, when present.
    pub time_us: Option<u64>,
    /// Collection NSID, when present.
    pub collection: Option<String>,
    /// Record key, when present.
    pub rkey: Option<String>,
    /// `createdAt` of the record, when present.
    pub created_at: Option<String>,
}

impl CommitEvent {
    /// Extract a create commit with text, or `None` when the shape differs.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("kind").and_then(Value::as_str) != Some(KIND_COMMIT) {
            return None;
        }

        let commit = value.get("commit")?;
        if commit.get("operation").and_then(Value::as_str) != Some(OPERATION_CREATE) {
            return None;
        }

        let record = commit.get("record")?;
        let text = record.get("text").and_then(Value::as_str)?;

        Some(Self {
            text: text.to_string(),
            did: str_field(value, "did"),
            time_us: value.get("time_us").and_then(Value::as_u64),
            collection: str_field(commit, "collection"),
            rkey: str_field(commit, "rkey"),
            created_at: str_field(record, "createdAt"),
        })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Short text fragment shown as a live indicator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleToken(String);

impl SampleToken {
    /// Token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SampleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for SampleToken {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What became of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Empty or absent payload.
    Empty,
    /// Payload is not JSON.
    Malformed,
    /// Valid JSON that is not a matching create commit.
    Irrelevant,
    /// A sample was drawn.
    Sample(SampleToken),
}

/// Turns frames into sample tokens.
#[derive(Debug, Clone)]
pub struct EventFilter {
    max_len: usize,
    /// Lowercased `#tag` needles; empty means no hashtag restriction.
    hashtags: Vec<String>,
}

impl EventFilter {
    /// Filter producing tokens of at most `max_len` characters.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            hashtags: Vec::new(),
        }
    }

    /// Only accept texts containing `#tag` for one of `tags` (case-insensitive).
    pub fn with_hashtags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hashtags = tags
            .into_iter()
            .map(|tag| format!("#{}", tag.as_ref().trim_start_matches('#').to_lowercase()))
            .collect();
        self
    }

    /// Produce a sample token, or nothing for frames that do not qualify.
    pub fn process(&self, frame: Option<&str>, rng: &mut dyn RandomSource) -> Option<SampleToken> {
        match self.classify(frame, rng) {
            FilterOutcome::Sample(token) => Some(token),
            _ => None,
        }
    }

    /// Like [`process`](Self::process), but reports why a frame was dropped.
    pub fn classify(&self, frame: Option<&str>, rng: &mut dyn RandomSource) -> FilterOutcome {
        let Some(frame) = frame.filter(|f| !f.is_empty()) else {
            return FilterOutcome::Empty;
        };

        let value: Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(_) => return FilterOutcome::Malformed,
        };

        let Some(event) = CommitEvent::from_value(&value) else {
            return FilterOutcome::Irrelevant;
        };

        if !self.matches_hashtags(&event.text) {
            return FilterOutcome::Irrelevant;
        }

        debug!(
            did = event.did.as_deref().unwrap_or("-"),
            collection = event.collection.as_deref().unwrap_or("-"),
            rkey = event.rkey.as_deref().unwrap_or("-"),
            created_at = event.created_at.as_deref().unwrap_or("-"),
            "Accepted create commit"
        );

        FilterOutcome::Sample(self.sample(&event.text, rng))
    }

    /// Pick one space-delimited word of `text` and truncate it.
    ///
    /// Splitting is on single spaces, so empty text yields one empty word and
    /// consecutive spaces yield empty words.
    pub fn sample(&self, text: &str, rng: &mut dyn RandomSource) -> SampleToken {
        let words: Vec<&str> = text.split(' ').collect();
        let word = words[rng.pick(words.len())];
        SampleToken(word.chars().take(self.max_len).collect())
    }

    fn matches_hashtags(&self, text: &str) -> bool {
        if self.hashtags.is_empty() {
            return true;
        }
        let lowered = text.to_lowercase();
        self.hashtags.iter().any(|tag| lowered.contains(tag))
    }
}
