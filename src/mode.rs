//! Keyword-based task-category inference.
//!
//! Classifies raw input into one of four task modes by scanning for
//! domain keywords. Health signals outrank technical ones: "deploy a
//! diet app" is a health request, not a deployment request. The
//! classification is a pure function with no external calls.

use serde::{Deserialize, Serialize};

/// Task-category hint used to select a role template.
///
/// `Auto` means "not specified": it is resolved to a concrete mode via
/// [`infer_mode`] before any template lookup. Unrecognized mode strings
/// deserialize to `Auto` rather than failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mode {
    Analytical,
    Technical,
    Creative,
    Health,
    #[default]
    Auto,
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "analytical" => Mode::Analytical,
            "technical" => Mode::Technical,
            "creative" => Mode::Creative,
            "health" => Mode::Health,
            _ => Mode::Auto,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Mode::Analytical => "analytical",
            Mode::Technical => "technical",
            Mode::Creative => "creative",
            Mode::Health => "health",
            Mode::Auto => "auto",
        };
        write!(f, "{label}")
    }
}

impl Mode {
    /// Resolve `Auto` to a concrete mode by inference; explicit modes
    /// are never overridden.
    pub fn resolve(self, raw: &str) -> Mode {
        match self {
            Mode::Auto => infer_mode(raw),
            explicit => explicit,
        }
    }
}

static HEALTH_KEYWORDS: &[&str] = &[
    "health", "gut", "diet", "nutrition", "nutrient", "digest", "digestion",
    "ibs", "microbiome", "food", "coriander", "cilantro", "herb", "spice",
];

static TECH_KEYWORDS: &[&str] = &[
    "code", "bug", "api", "deploy", "docker", "python", "javascript",
    "error", "stack trace",
];

/// Infer a task mode from raw text via case-insensitive keyword presence.
///
/// Health keywords take priority over technical ones; anything else
/// defaults to analytical. Never fails.
pub fn infer_mode(text: &str) -> Mode {
    let lower = text.to_lowercase();
    if HEALTH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Mode::Health;
    }
    if TECH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Mode::Technical;
    }
    Mode::Analytical
}
