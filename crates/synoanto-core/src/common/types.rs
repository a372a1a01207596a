//! # Lookup Domain Types
//!
//! This module defines the values that flow through a dictionary lookup:
//!
//! - [`Word`] - the validated lookup key
//! - [`Provider`] - which upstream a fetch targets
//! - [`AggregatedPayload`] - the combined provider responses returned to
//!   clients and cached per word
//! - [`AggregatedEntry`] - a cached payload with its bookkeeping timestamps
//! - [`SearchEvent`] and [`TrendingWord`] - the append-only search log and
//!   its aggregate view
//!
//! Upstream payloads are kept as [`serde_json::Value`]. The service never
//! inspects the provider schemas, it only passes them through.

use super::error::Error;
use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of entries returned by the trending query.
pub const TRENDING_LIMIT: usize = 5;

/// A dictionary lookup key.
///
/// Case-sensitive and stored exactly as received. The only validation is
/// that it is not empty; whitespace is a valid word.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(String);

impl Word {
    pub fn parse(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidWord {
                reason: "word must not be empty".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Word {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One of the two upstream lexical-data providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Definitions (collegiate dictionary).
    Collegiate,
    /// Synonyms and antonyms.
    Thesaurus,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Collegiate, Provider::Thesaurus];

    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Collegiate => "collegiate",
            Provider::Thesaurus => "thesaurus",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The combined result of both providers for one word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPayload {
    pub collegiate: Value,
    pub thesaurus: Value,
}

/// A cached payload as held by a persistence backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub word: Word,
    pub payload: AggregatedPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single lookup attempt, recorded whether or not it succeeded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub word: Word,
    /// `None` for anonymous searches.
    pub user_id: Option<i64>,
    pub searched_at: DateTime<Utc>,
}

impl SearchEvent {
    pub fn anonymous(word: Word) -> Self {
        Self {
            word,
            user_id: None,
            searched_at: Utc::now(),
        }
    }
}

/// A word and how many times it was searched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingWord {
    pub word: String,
    pub count: i64,
}
