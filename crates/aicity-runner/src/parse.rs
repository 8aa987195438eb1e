//! LLM response parsing into typed engine structures.
//!
//! The model returns raw text (ideally JSON). This module extracts and
//! validates decisions, verdict-notes, rulings, and role choices.
//! Recovery strategies, in order: direct parse, markdown code-block
//! extraction, trailing-comma stripping, then both. Anything that still
//! fails is a [`RunnerError::Parse`] and the engine falls back.

use rust_decimal::Decimal;
use serde::Deserialize;

use aicity_justice::{JudgeRuling, VerdictNote};
use aicity_types::{ActionKind, Decision, Role};

use crate::RunnerError;

// ---------------------------------------------------------------------------
// Generic recovery
// ---------------------------------------------------------------------------

/// Deserialize `raw` through every recovery strategy.
fn parse_with_recovery<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, RunnerError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok(parsed);
    }

    if let Some(block) = extract_json_from_codeblock(trimmed)
        && let Ok(parsed) = serde_json::from_str::<T>(block)
    {
        return Ok(parsed);
    }

    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(parsed) = serde_json::from_str::<T>(&cleaned) {
        return Ok(parsed);
    }

    if let Some(block) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(block);
        if let Ok(parsed) = serde_json::from_str::<T>(&cleaned_inner) {
            return Ok(parsed);
        }
    }

    Err(RunnerError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Pull the body out of a ``` fenced block, tolerating a language tag.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Remove commas dangling before a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            let mut lookahead = chars.clone();
            let mut next_significant = None;
            for n in lookahead.by_ref() {
                if !n.is_whitespace() {
                    next_significant = Some(n);
                    break;
                }
            }
            if matches!(next_significant, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    message_to: Option<String>,
    #[serde(default)]
    message_body: Option<String>,
    #[serde(default, alias = "mood")]
    mood_self: Option<String>,
    #[serde(default, alias = "reasoning")]
    rationale: Option<String>,
}

/// Parse a decision reply.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] when no strategy yields a decision with
/// a recognizable action.
pub fn parse_decision(raw: &str) -> Result<Decision, RunnerError> {
    let parsed: RawDecision = parse_with_recovery(raw)?;
    let action = parse_action(&parsed.action)?;
    Ok(Decision {
        action,
        details: parsed.details.unwrap_or_default(),
        target: parsed.target.filter(|t| !t.is_empty()),
        message_to: parsed.message_to.filter(|t| !t.is_empty()),
        message_body: parsed.message_body.filter(|t| !t.is_empty()),
        mood_self: parsed.mood_self.unwrap_or_default(),
        rationale: parsed.rationale.unwrap_or_default(),
    })
}

/// Parse an action name, tolerating case and separator drift.
fn parse_action(s: &str) -> Result<ActionKind, RunnerError> {
    // Exact wire name first.
    let quoted = format!("\"{s}\"");
    if let Ok(action) = serde_json::from_str::<ActionKind>(&quoted) {
        return Ok(action);
    }

    // Case-insensitive fallback for common LLM spellings.
    match s.to_lowercase().replace([' ', '-'], "_").as_str() {
        "work" => Ok(ActionKind::Work),
        "explore" => Ok(ActionKind::Explore),
        "trade" => Ok(ActionKind::Trade),
        "patrol" => Ok(ActionKind::Patrol),
        "teach" => Ok(ActionKind::Teach),
        "heal" => Ok(ActionKind::Heal),
        "deliver_news" | "delivernews" => Ok(ActionKind::DeliverNews),
        "defend" => Ok(ActionKind::Defend),
        "steal" => Ok(ActionKind::Steal),
        "lurk" => Ok(ActionKind::Lurk),
        "learn" => Ok(ActionKind::Learn),
        "recruit" => Ok(ActionKind::Recruit),
        "blackmail" => Ok(ActionKind::Blackmail),
        "destroy_asset" | "destroyasset" => Ok(ActionKind::DestroyAsset),
        "start_project" | "startproject" => Ok(ActionKind::StartProject),
        "work_on_project" | "workonproject" => Ok(ActionKind::WorkOnProject),
        "report" => Ok(ActionKind::Report),
        "rest" | "no_action" | "noaction" => Ok(ActionKind::Rest),
        other => Err(RunnerError::Parse(format!("unknown action {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Verdict notes, rulings, role choices
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawVerdictNote {
    #[serde(default)]
    confidence: f64,
    #[serde(default, alias = "suspect_rank")]
    suspects: Vec<String>,
    #[serde(default)]
    suspect: Option<String>,
    #[serde(default)]
    next_actions: Option<String>,
    #[serde(default, alias = "case_note_text")]
    case_note: Option<String>,
    #[serde(default)]
    request_arrest: bool,
}

/// Parse an investigation reply.
pub fn parse_verdict_note(raw: &str) -> Result<VerdictNote, RunnerError> {
    let parsed: RawVerdictNote = parse_with_recovery(raw)?;
    let mut suspect_rank = parsed.suspects;
    if let Some(single) = parsed.suspect
        && !single.is_empty()
        && !suspect_rank.contains(&single)
    {
        suspect_rank.insert(0, single);
    }
    Ok(VerdictNote {
        confidence: Decimal::from_f64_retain(parsed.confidence.clamp(0.0, 1.0))
            .unwrap_or_default()
            .round_dp(2),
        suspect_rank,
        next_actions: parsed.next_actions.unwrap_or_default(),
        case_note_text: parsed
            .case_note
            .unwrap_or_else(|| String::from("No new leads today.")),
        request_arrest: parsed.request_arrest,
    })
}

#[derive(Debug, Deserialize)]
struct RawRuling {
    guilty: bool,
    #[serde(default)]
    fine: u64,
    #[serde(default, alias = "exile_days")]
    sentence_days: u32,
    #[serde(default)]
    statement: Option<String>,
}

/// Parse a trial reply.
pub fn parse_ruling(raw: &str) -> Result<JudgeRuling, RunnerError> {
    let parsed: RawRuling = parse_with_recovery(raw)?;
    Ok(JudgeRuling {
        guilty: parsed.guilty,
        fine: parsed.fine,
        sentence_days: parsed.sentence_days,
        statement: parsed
            .statement
            .unwrap_or_else(|| String::from("The court has ruled.")),
    })
}

#[derive(Debug, Deserialize)]
struct RawGraduation {
    chosen_role: String,
    #[serde(default)]
    statement: Option<String>,
}

/// Parse a graduation reply into a role and statement.
pub fn parse_graduation(raw: &str) -> Result<(Role, String), RunnerError> {
    let parsed: RawGraduation = parse_with_recovery(raw)?;
    let quoted = format!("\"{}\"", parsed.chosen_role.to_lowercase());
    let role = serde_json::from_str::<Role>(&quoted)
        .map_err(|_| RunnerError::Parse(format!("unknown role {:?}", parsed.chosen_role)))?;
    Ok((role, parsed.statement.unwrap_or_default()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clean_decision_parses() {
        let raw = r#"{"action": "steal", "target": "Elena Voss", "mood_self": "hungry", "rationale": "she is the richest"}"#;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, ActionKind::Steal);
        assert_eq!(decision.target.as_deref(), Some("Elena Voss"));
    }

    #[test]
    fn codeblock_decision_parses() {
        let raw = "Here is my choice:\n```json\n{\"action\": \"Work\", \"details\": \"overtime\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, ActionKind::Work);
        assert_eq!(decision.details, "overtime");
    }

    #[test]
    fn trailing_commas_recover() {
        let raw = r#"{"action": "patrol", "details": "watch the market",}"#;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, ActionKind::Patrol);
    }

    #[test]
    fn garbage_fails_cleanly() {
        assert!(parse_decision("I think I will work hard today!").is_err());
        assert!(parse_decision(r#"{"action": "fly"}"#).is_err());
    }

    #[test]
    fn verdict_note_accepts_single_suspect_field() {
        let raw = r#"{"confidence": 0.72, "suspect": "Renn Voss", "case_note": "the pattern holds", "request_arrest": true}"#;
        let note = parse_verdict_note(raw).unwrap();
        assert_eq!(note.suspect_rank, vec![String::from("Renn Voss")]);
        assert_eq!(note.confidence, Decimal::new(72, 2));
        assert!(note.request_arrest);
    }

    #[test]
    fn verdict_confidence_clamps() {
        let raw = r#"{"confidence": 7.5, "suspects": []}"#;
        let note = parse_verdict_note(raw).unwrap();
        assert_eq!(note.confidence, Decimal::ONE);
    }

    #[test]
    fn ruling_defaults_are_sane() {
        let ruling = parse_ruling(r#"{"guilty": true, "fine": 300}"#).unwrap();
        assert!(ruling.guilty);
        assert_eq!(ruling.fine, 300);
        assert_eq!(ruling.sentence_days, 0);
        assert!(!ruling.statement.is_empty());
    }

    #[test]
    fn graduation_resolves_roles() {
        let (role, statement) =
            parse_graduation(r#"{"chosen_role": "healer", "statement": "I will mend."}"#).unwrap();
        assert_eq!(role, Role::Healer);
        assert_eq!(statement, "I will mend.");
        assert!(parse_graduation(r#"{"chosen_role": "king"}"#).is_err());
    }
}
