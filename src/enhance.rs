//! Deterministic prompt enhancement.
//!
//! Builds a structured prompt document from raw input using fixed role
//! and tone templates. This path never fails and never touches the
//! network; it is the reliability backbone the pro tier falls back to.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Tone guidance selector. Unrecognized labels are kept verbatim so the
/// output can still echo what the caller asked for, while the guidance
/// text falls back to concise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    Concise,
    Formal,
    Friendly,
    Persuasive,
    Neutral,
    Other(String),
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Concise
    }
}

impl From<String> for Tone {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "concise" | "" => Tone::Concise,
            "formal" => Tone::Formal,
            "friendly" => Tone::Friendly,
            "persuasive" => Tone::Persuasive,
            "neutral" => Tone::Neutral,
            other => Tone::Other(other.to_string()),
        }
    }
}

impl From<Tone> for String {
    fn from(t: Tone) -> Self {
        t.label().to_string()
    }
}

impl Tone {
    /// The lowercase label echoed in output, even for unknown tones.
    pub fn label(&self) -> &str {
        match self {
            Tone::Concise => "concise",
            Tone::Formal => "formal",
            Tone::Friendly => "friendly",
            Tone::Persuasive => "persuasive",
            Tone::Neutral => "neutral",
            Tone::Other(label) => label,
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Tone::Concise => "Short, direct sentences. No filler.",
            Tone::Formal => "Professional, precise, no slang.",
            Tone::Friendly => "Warm, encouraging, and approachable.",
            Tone::Persuasive => "Benefit-led framing with a soft CTA.",
            Tone::Neutral => "Balanced, objective tone.",
            // Unknown tones get the concise guidance text.
            Tone::Other(_) => "Short, direct sentences. No filler.",
        }
    }
}

/// Caller-selected service level. Unknown values are preserved so the
/// orchestrator can reject them with a 400 instead of silently mapping
/// them to a tier the caller did not ask for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Tier {
    Free,
    Pro,
    Unknown(String),
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Free
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "free" | "" => Tier::Free,
            "pro" => Tier::Pro,
            other => Tier::Unknown(other.to_string()),
        }
    }
}

/// Body of `POST /enhance`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnhanceRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub tier: Tier,
}

/// Response of `POST /enhance`, for both the deterministic and the
/// external-model path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceResult {
    pub enhanced: String,
    pub improvements: Vec<String>,
    /// Which path or model produced the result.
    pub model_used: String,
    /// Present only when a pro-tier call fell back to the deterministic
    /// path; carries a truncated provider diagnostic.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

/// Identifier reported when the deterministic path produced the result.
pub const DETERMINISTIC_MODEL: &str = "deterministic-fallback";

fn role_template(mode: Mode) -> &'static str {
    match mode {
        Mode::Technical => {
            "You are a senior software engineer. Provide step-by-step instructions, \
             examples, edge cases, and complexity notes."
        }
        Mode::Creative => {
            "You are a creative editor. Provide voice, hook, narrative structure, \
             and audience focus."
        }
        Mode::Health => {
            "You are a clinician/nutritionist. Provide evidence-aware advice, \
             mechanisms of action, safety, contraindications, and practical guidance."
        }
        // Auto is resolved before lookup; if it ever reaches here it gets
        // the analytical template like any other unmatched key.
        Mode::Analytical | Mode::Auto => {
            "You are a general analyst. Provide structured reasoning, assumptions, \
             risks, and a decision rubric."
        }
    }
}

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9\-]{3,}").expect("entity regex is valid"));

/// Extract naive entity hints: alphanumeric-and-hyphen tokens of length
/// >= 3, deduplicated, sorted, joined and capped at 300 characters.
fn entity_hints(raw: &str) -> String {
    let tokens: BTreeSet<&str> = ENTITY_RE.find_iter(raw).map(|m| m.as_str()).collect();
    let joined = tokens.into_iter().collect::<Vec<_>>().join(", ");
    let capped = truncate_chars(&joined, 300);
    if capped.is_empty() {
        "N/A".to_string()
    } else {
        capped.to_string()
    }
}

/// Truncate to at most `max` characters without splitting a char.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Build a structured prompt from raw input, mode, and tone.
///
/// Infallible and deterministic: identical inputs yield identical
/// output. `Mode::Auto` is resolved by inference; explicit modes are
/// used as-is. The raw input is embedded verbatim, unescaped.
pub fn deterministic_enhance(raw: &str, mode: Mode, tone: &Tone) -> EnhanceResult {
    let raw = raw.trim();
    let mode = mode.resolve(raw);
    let role = role_template(mode);
    let guidance = tone.guidance();
    let entities = entity_hints(raw);

    let enhanced = format!(
        "# Role\n\
         {role}\n\
         \n\
         # Task\n\
         Write a clear, structured response that directly fulfills the user's intent.\n\
         \n\
         # User Intent (verbatim)\n\
         \"\"\"{raw}\"\"\"\n\
         \n\
         # Constraints\n\
         - Avoid hallucinations; if uncertain, explicitly state assumptions and ask up to 2 clarifying questions.\n\
         - Keep within 250-400 words unless clinical nuance or citations are essential.\n\
         \n\
         # Tone\n\
         - {tone_label}. {guidance}\n\
         \n\
         # Output Format\n\
         - Use headings and bullet points when helpful.\n\
         - Conclude with a brief checklist/summary.\n\
         \n\
         # Quality Checks\n\
         - Be evidence-aware; mention quality of evidence if applicable (e.g., RCTs vs observational).\n\
         \n\
         # Context Hints\n\
         - Entities detected: {entities}\n",
        tone_label = capitalize(tone.label()),
    );

    let improvements = vec![
        format!("Mode preset applied: {mode}"),
        format!("Tone guidance applied: {}", tone.label()),
        "Added structure: Role, Task, Intent, Constraints, Tone, Output, Checks".to_string(),
        "Added anti-hallucination guidance & clarifying-question allowance".to_string(),
        "Included naive entity/context hints".to_string(),
    ];

    EnhanceResult {
        enhanced,
        improvements,
        model_used: DETERMINISTIC_MODEL.to_string(),
        note: None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn enhance_is_idempotent() {
        let a = deterministic_enhance("compare index funds", Mode::Analytical, &Tone::Concise);
        let b = deterministic_enhance("compare index funds", Mode::Analytical, &Tone::Concise);
        assert_eq!(a.enhanced, b.enhanced);
        assert_eq!(a.improvements, b.improvements);
    }

    #[test]
    fn enhanced_is_non_empty_and_tagged() {
        let result = deterministic_enhance("anything at all", Mode::Auto, &Tone::Concise);
        assert!(!result.enhanced.is_empty());
        assert_eq!(result.model_used, DETERMINISTIC_MODEL);
        assert!(result.note.is_none());
    }

    #[test]
    fn health_input_gets_clinician_role() {
        let result = deterministic_enhance(
            "My stomach hurts after eating coriander",
            Mode::Auto,
            &Tone::Formal,
        );
        assert!(result.enhanced.contains("You are a clinician/nutritionist."));
        assert!(result.enhanced.contains("- Formal. Professional, precise, no slang."));
        // Sorted entity hints include the salient tokens.
        assert!(result.enhanced.contains("coriander"));
        assert!(result.enhanced.contains("eating"));
        assert!(result.enhanced.contains("hurts"));
        assert!(result.enhanced.contains("stomach"));
    }

    #[test]
    fn explicit_mode_wins_over_inference() {
        let result = deterministic_enhance(
            "write a poem about my diet",
            Mode::Creative,
            &Tone::Concise,
        );
        assert!(result.enhanced.contains("You are a creative editor."));
        assert!(result.improvements[0].contains("creative"));
    }

    #[test]
    fn raw_input_is_embedded_verbatim() {
        let raw = "keep \"quotes\" & <angles> {braces} exactly";
        let result = deterministic_enhance(raw, Mode::Analytical, &Tone::Neutral);
        assert!(result.enhanced.contains(raw));
    }

    #[test]
    fn unknown_tone_echoes_label_with_concise_guidance() {
        let tone = Tone::from("sarcastic".to_string());
        let result = deterministic_enhance("summarize this", Mode::Analytical, &tone);
        assert!(result.enhanced.contains("- Sarcastic. Short, direct sentences. No filler."));
    }

    #[test]
    fn entity_hints_are_sorted_and_deduplicated() {
        let result = deterministic_enhance(
            "zebra apple zebra apple banana",
            Mode::Analytical,
            &Tone::Concise,
        );
        assert!(result.enhanced.contains("Entities detected: apple, banana, zebra"));
    }

    #[test]
    fn short_tokens_yield_no_entities() {
        let result = deterministic_enhance("a b? c!", Mode::Analytical, &Tone::Concise);
        assert!(result.enhanced.contains("Entities detected: N/A"));
    }

    #[test]
    fn entity_hints_are_capped() {
        let raw = (0..100)
            .map(|i| format!("entity-number-{i:03}"))
            .collect::<Vec<_>>()
            .join(" ");
        let result = deterministic_enhance(&raw, Mode::Analytical, &Tone::Concise);
        let hints_line = result
            .enhanced
            .lines()
            .find(|l| l.starts_with("- Entities detected:"))
            .unwrap();
        assert!(hints_line.len() <= "- Entities detected: ".len() + 300);
    }

    #[test]
    fn tier_parsing_is_case_insensitive_and_preserves_unknowns() {
        assert_eq!(Tier::from("PRO".to_string()), Tier::Pro);
        assert_eq!(Tier::from("".to_string()), Tier::Free);
        assert_eq!(
            Tier::from("enterprise".to_string()),
            Tier::Unknown("enterprise".to_string())
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
