//! Search-intent detection.
//!
//! Decides whether a user message should go to a search-augmented model
//! variant. Rules are applied in a fixed order:
//!
//! 1. a self-referential keyword ("you", "yourself", ...) means no search
//! 2. a strong pattern ("search for", "current price", ...) means search
//! 3. a weak question pattern plus an external-topic keyword means search
//! 4. anything else means no search

use once_cell::sync::Lazy;
use regex::Regex;

static SELF_REFERENTIAL: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(you|your|yours|yourself|yourselves)\b"));

static STRONG_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bsearch\s+(for|the\s+web|online|up)\b",
        r"(?i)\b(look\s+up|google\s+for|find\s+online)\b",
        r"(?i)\b(current|latest|live|real[- ]time|today'?s|recent)\s+(price|prices|weather|news|score|scores|rate|rates|stock|stocks|headlines|results?)\b",
        r"(?i)\b(weather|forecast)\s+(today|tomorrow|tonight|in|for|this\s+week)\b",
        r"(?i)\b(news|headlines)\s+(today|about|on|from)\b",
        r"(?i)\b(right\s+now|as\s+of\s+today|this\s+week's|breaking)\b",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static WEAK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*(what|who|where|when|which)('s|\s+is|\s+are|\s+was|\s+were|\s+did|\s+does)\b",
        r"(?i)^\s*how\s+(much|many|old|tall|far|to)\b",
        r"(?i)^\s*(tell\s+me\s+about|is\s+there|are\s+there)\b",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

static EXTERNAL_TOPIC: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(price|prices|cost|news|weather|stock|stocks|market|score|election|president|ceo|founder|population|capital|bitcoin|ethereum|crypto|exchange\s+rate|released?|release\s+date|(19|20)\d{2})\b",
    )
});

/// Capitalized word after the first token, e.g. "Who is Ada Lovelace"
static NAMED_ENTITY: Lazy<Regex> = Lazy::new(|| compile(r"\s[A-Z][a-z]+(\s[A-Z][a-z]+)*"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in search pattern {pattern}: {e}"),
    }
}

/// Whether `text` asks for information that needs a live web search
#[must_use]
pub fn is_search_query(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || SELF_REFERENTIAL.is_match(text) {
        return false;
    }
    if STRONG_PATTERNS.iter().any(|re| re.is_match(text)) {
        return true;
    }
    WEAK_PATTERNS.iter().any(|re| re.is_match(text)) && has_external_topic(text)
}

fn has_external_topic(text: &str) -> bool {
    EXTERNAL_TOPIC.is_match(text) || NAMED_ENTITY.is_match(text)
}
