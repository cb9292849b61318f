//! Question text handling: expert prefix, hop limit, and the two target terms.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;

/// Hop limit used when the question does not state one.
pub const DEFAULT_HOP_LIMIT: usize = 10;
/// Largest hop limit a question may ask for.
pub const MAX_REQUESTED_HOPS: usize = 25;

fn expert_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*x:\s*").expect("Invalid regex pattern"))
}

fn hop_bound() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:<=|≤)\s*([0-9]{1,2})").expect("Invalid regex pattern"))
}

fn hop_count_phrase() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([0-9]{1,2})\s*(?:hops?|steps?)").expect("Invalid regex pattern"))
}

fn between_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)between\s+(.+?)\s+and\s+(.+?)(?:\s*[?.!]|$)").expect("Invalid regex pattern")
    })
}

fn list_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\blist\b").expect("Invalid regex pattern"))
}

/// Drop a leading `x:` marker used by expert-mode clients.
pub fn strip_expert_prefix(question: &str) -> String {
    expert_prefix().replace(question, "").trim().to_string()
}

/// Hop limit stated in the question (`<= 4`, `≤4`, `3 hops`, `5 steps`),
/// clamped to `[1, 25]`; `default` when none is stated.
pub fn hop_limit_from_text(question: &str, default: usize) -> usize {
    let stated = hop_bound()
        .captures(question)
        .or_else(|| hop_count_phrase().captures(question))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());

    match stated {
        Some(n) => n.clamp(1, MAX_REQUESTED_HOPS),
        None => default.clamp(1, MAX_REQUESTED_HOPS),
    }
}

/// Whether the question explicitly asks for a list.
pub fn mentions_list(question: &str) -> bool {
    list_word().is_match(question)
}

/// The two sides of a relationship question. Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTerms {
    pub x: Option<String>,
    pub y: Option<String>,
}

impl ExtractedTerms {
    pub fn new(x: Option<String>, y: Option<String>) -> Self {
        let clean = |t: Option<String>| t.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self { x: clean(x), y: clean(y) }
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    /// Fill whichever sides are missing from `other`.
    pub fn or_fill(self, other: ExtractedTerms) -> ExtractedTerms {
        ExtractedTerms {
            x: self.x.or(other.x),
            y: self.y.or(other.y),
        }
    }
}

/// Turns a free-text question into its two target terms.
pub trait TermExtractor {
    fn extract(&self, question: &str) -> Result<ExtractedTerms>;
}

/// Regex backstop: "... between X and Y?".
#[derive(Debug, Clone, Copy, Default)]
pub struct BetweenPattern;

impl TermExtractor for BetweenPattern {
    fn extract(&self, question: &str) -> Result<ExtractedTerms> {
        let Some(caps) = between_pattern().captures(question) else {
            return Ok(ExtractedTerms::default());
        };
        Ok(ExtractedTerms::new(
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map(|m| m.as_str().to_string()),
        ))
    }
}

/// Terms supplied by the caller up front.
#[derive(Debug, Clone, Default)]
pub struct ExplicitTerms {
    terms: ExtractedTerms,
}

impl ExplicitTerms {
    pub fn new(x: Option<String>, y: Option<String>) -> Self {
        Self {
            terms: ExtractedTerms::new(x, y),
        }
    }
}

impl TermExtractor for ExplicitTerms {
    fn extract(&self, _question: &str) -> Result<ExtractedTerms> {
        Ok(self.terms.clone())
    }
}
