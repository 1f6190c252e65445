//! Topical relevance from trigger words and phrases.
//!
//! A text matches a [`TriggerSet`] when any trigger word appears as a whole
//! word, or any trigger phrase appears anywhere, ignoring case. Sources opt
//! into gates (AI, region); [`RelevancePolicy::admits`] requires every
//! evaluated gate's match to equal the source's flag for it.

use crate::error::{Result, ScrapeError};
use gleaner_core::RelevanceConfig;
use std::collections::HashSet;
use std::path::Path;

/// Read a trigger file: one entry per line, blank lines skipped,
/// duplicates dropped with a warning.
pub fn load_trigger_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ScrapeError::Triggers {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    let mut duplicates = 0usize;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if seen.insert(line.to_lowercase()) {
            entries.push(line.to_string());
        } else {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        tracing::warn!(
            path = %path.display(),
            duplicates,
            "Trigger file contains duplicate entries"
        );
    }
    tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded trigger file");
    Ok(entries)
}

/// Append `entry` to a trigger file unless an entry equal to it, ignoring
/// case, is already there. Returns whether the file changed.
pub fn add_trigger(path: &Path, entry: &str) -> Result<bool> {
    let entry = entry.trim();
    let key = entry.to_lowercase();
    let mut entries = load_trigger_file(path)?;
    if entry.is_empty() || entries.iter().any(|e| e.to_lowercase() == key) {
        return Ok(false);
    }
    entries.push(entry.to_string());
    write_trigger_file(path, &entries)?;
    tracing::info!(path = %path.display(), entry, "Trigger added");
    Ok(true)
}

/// Remove every entry equal to `entry`, ignoring case. Returns whether the
/// file changed.
pub fn remove_trigger(path: &Path, entry: &str) -> Result<bool> {
    let entry = entry.trim();
    let key = entry.to_lowercase();
    let entries = load_trigger_file(path)?;
    let kept: Vec<String> = entries
        .iter()
        .filter(|e| e.to_lowercase() != key)
        .cloned()
        .collect();
    if kept.len() == entries.len() {
        return Ok(false);
    }
    write_trigger_file(path, &kept)?;
    tracing::info!(path = %path.display(), entry, "Trigger removed");
    Ok(true)
}

fn write_trigger_file(path: &Path, entries: &[String]) -> Result<()> {
    let mut content = entries.join("\n");
    content.push('\n');
    std::fs::write(path, content).map_err(|e| ScrapeError::Triggers {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Whether `text` contains any trigger.
///
/// Words match whole whitespace-separated tokens with surrounding
/// punctuation trimmed; phrases match as substrings. Both ignore case.
pub fn classify<W, P>(text: &str, words: &[W], phrases: &[P]) -> bool
where
    W: AsRef<str>,
    P: AsRef<str>,
{
    let lowered = text.to_lowercase();
    let tokens: HashSet<&str> = tokens(&lowered).collect();

    words
        .iter()
        .any(|w| tokens.contains(w.as_ref().to_lowercase().as_str()))
        || phrases
            .iter()
            .map(|p| p.as_ref().to_lowercase())
            .any(|p| !p.is_empty() && lowered.contains(&p))
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
}

/// Words and phrases for one topic, stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    words: HashSet<String>,
    phrases: Vec<String>,
}

impl TriggerSet {
    pub fn new<W, P>(words: W, phrases: P) -> Self
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_files(words: &Path, phrases: &Path) -> Result<Self> {
        Ok(Self::new(load_trigger_file(words)?, load_trigger_file(phrases)?))
    }

    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        tokens(&lowered).any(|t| self.words.contains(t))
            || self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.words.len() + self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All trigger lists, built once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct RelevancePolicy {
    ai: TriggerSet,
    region: TriggerSet,
    strict_gates: bool,
}

impl RelevancePolicy {
    pub fn new(ai: TriggerSet, region: TriggerSet) -> Self {
        Self {
            ai,
            region,
            strict_gates: false,
        }
    }

    /// Also evaluate gates a source did not ask for, rejecting text that
    /// matches them.
    #[must_use]
    pub fn with_strict_gates(mut self, strict: bool) -> Self {
        self.strict_gates = strict;
        self
    }

    /// Load the four trigger files named in configuration.
    pub fn from_config(config: &RelevanceConfig) -> Result<Self> {
        let ai = TriggerSet::from_files(&config.ai_words, &config.ai_phrases)?;
        let region = TriggerSet::from_files(&config.region_words, &config.region_phrases)?;
        tracing::info!(
            ai_triggers = ai.len(),
            region_triggers = region.len(),
            strict_gates = config.strict_gates,
            "Relevance policy loaded"
        );
        Ok(Self::new(ai, region).with_strict_gates(config.strict_gates))
    }

    /// Decide whether a listing title passes the source's gates.
    ///
    /// A gate the source does not require counts as "no match" unless
    /// strict gates are on, so by default it never rejects.
    pub fn admits(&self, text: &str, wants_ai: bool, wants_region: bool) -> bool {
        let ai = (wants_ai || self.strict_gates) && self.ai.matches(text);
        let region = (wants_region || self.strict_gates) && self.region.matches(text);
        ai == wants_ai && region == wants_region
    }
}
