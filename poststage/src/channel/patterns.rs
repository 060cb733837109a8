//! Ordered alternative patterns for expect calls.

use regex::bytes::Regex;

use crate::error::ChannelError;

/// Where and which alternative of a [`PatternSet`] matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Index of the matching alternative in the set.
    pub index: usize,

    /// Byte offset where the match starts.
    pub start: usize,

    /// Byte offset where the match ends.
    pub end: usize,
}

/// An ordered list of candidate patterns.
///
/// Resolution rule: the alternative whose match starts earliest in the
/// input wins; when several alternatives match at the same offset, the one
/// listed first wins.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile a pattern set from regex sources.
    pub fn new<I, S>(sources: I) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = sources
            .into_iter()
            .map(|s| Regex::new(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Build a set from already compiled patterns.
    pub fn from_regexes(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// A set with a single alternative.
    pub fn single(pattern: Regex) -> Self {
        Self {
            patterns: vec![pattern],
        }
    }

    /// An empty set (send-only steps).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The pattern at `index`.
    pub fn get(&self, index: usize) -> Option<&Regex> {
        self.patterns.get(index)
    }

    /// Find the winning alternative in `data`.
    pub fn find(&self, data: &[u8]) -> Option<PatternMatch> {
        let mut best: Option<PatternMatch> = None;
        for (index, pattern) in self.patterns.iter().enumerate() {
            let Some(m) = pattern.find(data) else {
                continue;
            };
            // Strictly earlier only: equal starts keep the earlier-listed one.
            if best.is_none_or(|b| m.start() < b.start) {
                best = Some(PatternMatch {
                    index,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        best
    }

    /// Pattern sources, for logging.
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
