//! Persisted round-robin state.
//!
//! The record is `{cycle, done}`: the current cycle number (>= 1) and the
//! names of folders already processed in that cycle. Once `done` covers the
//! eligible set, the cycle advances and `done` resets in the same mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cross-run scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub cycle: u32,
    pub done: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            cycle: 1,
            done: BTreeSet::new(),
            updated_at: None,
        }
    }
}

/// On-disk shape, accepted leniently and then normalized.
#[derive(Debug, Deserialize)]
struct RawRunState {
    #[serde(default = "default_cycle")]
    cycle: i64,
    #[serde(default)]
    done: Vec<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

fn default_cycle() -> i64 {
    1
}

impl RunState {
    /// Parse a persisted record. Returns `None` when the text is not a valid record.
    pub fn from_json(text: &str) -> Option<Self> {
        let raw: RawRunState = serde_json::from_str(text).ok()?;
        let cycle = raw.cycle.clamp(1, i64::from(u32::MAX)) as u32;
        Some(Self {
            cycle,
            done: raw.done.into_iter().collect(),
            updated_at: raw.updated_at,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Whether `done` covers every eligible folder.
    pub fn is_complete(&self, eligible: &BTreeSet<String>) -> bool {
        !eligible.is_empty() && self.done == *eligible
    }

    /// Drop folders that are no longer eligible. If what remains already
    /// covers the eligible set, advance the cycle. Returns true on advance.
    pub fn reconcile(&mut self, eligible: &BTreeSet<String>) -> bool {
        self.done.retain(|name| eligible.contains(name));
        self.advance_if_complete(eligible)
    }

    /// Record a processed folder. Returns true when this completed the cycle.
    pub fn mark_done(&mut self, folder: &str, eligible: &BTreeSet<String>) -> bool {
        if eligible.contains(folder) {
            self.done.insert(folder.to_string());
        }
        self.advance_if_complete(eligible)
    }

    /// Eligible names (in the given order) not yet processed this cycle.
    pub fn remaining<'a, I>(&self, ordered_eligible: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ordered_eligible
            .into_iter()
            .filter(|name| !self.done.contains(*name))
            .collect()
    }

    fn advance_if_complete(&mut self, eligible: &BTreeSet<String>) -> bool {
        if self.is_complete(eligible) {
            self.cycle = self.cycle.saturating_add(1);
            self.done.clear();
            true
        } else {
            false
        }
    }
}
