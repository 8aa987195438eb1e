//! Decision types exchanged between the engine and the reasoning layer.
//!
//! The facade packs a [`DecisionRequest`] -- the reasoning model sees only
//! what the facade includes -- and the runner parses the model's reply into
//! a [`Decision`]. Unparseable output falls back to the role default; it is
//! never an exception path for control flow.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AssetKind, Role, TimePhase};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The closed set of actions a decision may select.
///
/// Which subset is available depends on the agent's role; see
/// [`RoleCapabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Steady role work for the day.
    Work,
    /// High-variance expedition.
    Explore,
    /// Market trading.
    Trade,
    /// Patrol and scan for thieves.
    Patrol,
    /// Run a lesson; raises newborn comprehension.
    Teach,
    /// Tend to a citizen in critical condition.
    Heal,
    /// Deliver messages and write the paper.
    DeliverNews,
    /// Represent a defendant or client.
    Defend,
    /// Attempt a theft against a wealthy target.
    Steal,
    /// Keep a low profile; small scores only.
    Lurk,
    /// Study under the assigned teacher.
    Learn,
    /// Court desperate citizens for the gang.
    Recruit,
    /// Extort a target over something the agent knows.
    Blackmail,
    /// Destroy a standing asset.
    DestroyAsset,
    /// Propose a new shared project.
    StartProject,
    /// Contribute a day of work to an active project.
    WorkOnProject,
    /// File a police report about a known crime.
    Report,
    /// Do nothing.
    Rest,
}

/// Static capability descriptor for a role.
///
/// Removes role dispatch by string match: the allowed actions, the fallback
/// default, and the base earn range all live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCapabilities {
    pub role: Role,
    /// Actions this role may select.
    pub allowed: &'static [ActionKind],
    /// Applied when the reasoning call fails or cannot be parsed.
    pub default_action: ActionKind,
    /// Base daily earn range (inclusive).
    pub earn_min: u64,
    pub earn_max: u64,
    /// Role that must co-contribute for this role's signature project, if
    /// any (e.g. hospital needs a healer).
    pub project_collaborator: Option<Role>,
}

// ---------------------------------------------------------------------------
// Parsed decision
// ---------------------------------------------------------------------------

/// A parsed decision from the reasoning model.
///
/// The parse tolerates mild reformatting; fields other than `action` are
/// best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Decision {
    pub action: ActionKind,
    /// Free-text qualifier ("work through the night", "target the market").
    #[serde(default)]
    pub details: String,
    /// Agent or asset name the action is aimed at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Recipient of an optional message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_body: Option<String>,
    /// Short self-described mood ("uneasy", "determined").
    #[serde(default)]
    pub mood_self: String,
    /// Short reasoning trace, logged but never acted on.
    #[serde(default)]
    pub rationale: String,
}

impl Decision {
    /// The fallback decision for a role: its default action, nothing else.
    pub fn fallback(caps: &RoleCapabilities) -> Self {
        Self {
            action: caps.default_action,
            details: String::new(),
            target: None,
            message_to: None,
            message_body: None,
            mood_self: String::new(),
            rationale: String::from("fallback"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision request (facade output, runner input)
// ---------------------------------------------------------------------------

/// One line of relationship context, pre-rendered for the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BondLine {
    pub other_name: String,
    pub other_role: Role,
    /// "close ally", "rival", ...
    pub label: String,
    /// Signed strength rendered as text, e.g. "+0.45".
    pub strength_text: String,
}

/// One inbox message, pre-rendered for the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InboxLine {
    pub day: u32,
    /// "Anonymous" for the anonymous sender sentinel.
    pub from_name: String,
    pub body: String,
}

/// Everything the reasoning model is allowed to see for one agent turn.
///
/// Mood and susceptibility are descriptive text, never numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionRequest {
    pub day: u32,
    pub time_phase: TimePhase,
    pub agent_name: String,
    pub role: Role,
    pub tokens: u64,
    pub age_days: u32,
    /// Mood converted to descriptive text.
    pub mood_text: String,
    /// Police only: "honest" / "pragmatic" / "corrupt" framing. Never the
    /// underlying number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub susceptibility_framing: Option<String>,
    /// Newborns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprehension: Option<u8>,
    /// Yesterday's public newspaper.
    pub newspaper: String,
    /// Standing asset kinds, as flags.
    pub standing_assets: Vec<AssetKind>,
    /// Most recent inbox messages, bounded.
    pub inbox: Vec<InboxLine>,
    /// Top-k positive and top-k negative bonds, annotated.
    pub bonds: Vec<BondLine>,
    /// Top recalls from the memory store relevant to today.
    pub recalls: Vec<String>,
    /// The role's allowed actions.
    pub available_actions: Vec<ActionKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_uses_default_action() {
        let caps = RoleCapabilities {
            role: Role::Thief,
            allowed: &[ActionKind::Steal, ActionKind::Lurk],
            default_action: ActionKind::Lurk,
            earn_min: 0,
            earn_max: 80,
            project_collaborator: None,
        };
        let d = Decision::fallback(&caps);
        assert_eq!(d.action, ActionKind::Lurk);
        assert!(d.target.is_none());
    }

    #[test]
    fn decision_tolerates_missing_optional_fields() {
        let parsed: Result<Decision, _> =
            serde_json::from_str(r#"{"action": "work"}"#);
        assert!(parsed.is_ok());
        let d = parsed.unwrap_or_else(|_| unreachable!());
        assert_eq!(d.action, ActionKind::Work);
        assert!(d.details.is_empty());
    }
}
