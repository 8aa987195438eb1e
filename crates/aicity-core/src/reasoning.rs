//! The pluggable reasoning service.
//!
//! Every external language-model surface the engine drives -- agent
//! decisions, the judge, the investigator, the narrator -- hangs off one
//! trait. The production implementation lives in the runner crate; tests
//! use [`ScriptedReasoner`], and [`OfflineReasoner`] exercises every
//! fallback path by failing every call.

use std::collections::{BTreeMap, VecDeque};

use aicity_types::{Decision, DecisionRequest, Role, StoryKind};

pub use aicity_justice::{
    InvestigationContext, JudgeRuling, ReasonerFailure, TrialBrief, VerdictNote,
};

/// What a graduating newborn's role choice sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraduationRequest {
    pub day: u32,
    pub agent_name: String,
    pub teacher_name: Option<String>,
    /// The newborn's formative memories.
    pub memories: Vec<String>,
    /// Roles the city will accept.
    pub allowed_roles: Vec<Role>,
}

/// What the narrator sees: public-scope material only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRequest {
    pub kind: StoryKind,
    pub day: u32,
    pub messenger_name: String,
    /// Rendered public events (the only event source the narrator gets).
    pub public_events: Vec<String>,
    /// Prior story bodies: dailies for a weekly, weeklies for a monthly.
    pub prior_bodies: Vec<String>,
    /// A standing archive enriches the chronicle.
    pub archive_flag: bool,
}

/// The external reasoning model, as the engine sees it.
///
/// Implementations must enforce their own timeouts; every method is a
/// suspension point from the scheduler's perspective and failures are
/// always recovered into fallbacks.
pub trait ReasoningService {
    /// One agent decision.
    fn decide(&mut self, request: &DecisionRequest) -> Result<Decision, ReasonerFailure>;

    /// A graduating newborn chooses a role; returns the role and a short
    /// statement.
    fn choose_role(
        &mut self,
        request: &GraduationRequest,
    ) -> Result<(Role, String), ReasonerFailure>;

    /// One daily case investigation.
    fn investigate(&mut self, ctx: &InvestigationContext)
    -> Result<VerdictNote, ReasonerFailure>;

    /// The closing narrative of a case.
    fn closing_narrative(
        &mut self,
        ctx: &InvestigationContext,
        disposition: &str,
    ) -> Result<String, ReasonerFailure>;

    /// One trial ruling.
    fn judge(&mut self, brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure>;

    /// A narrative artifact (daily paper, weekly review, monthly
    /// chronicle).
    fn write_narrative(&mut self, request: &NarrativeRequest) -> Result<String, ReasonerFailure>;
}

/// Adapter lending a [`ReasoningService`] to the justice crate's traits.
pub struct JusticeAdapter<'a>(pub &'a mut dyn ReasoningService);

impl aicity_justice::CaseReasoner for JusticeAdapter<'_> {
    fn investigate(
        &mut self,
        ctx: &InvestigationContext,
    ) -> Result<VerdictNote, ReasonerFailure> {
        self.0.investigate(ctx)
    }

    fn closing_narrative(
        &mut self,
        ctx: &InvestigationContext,
        disposition: &str,
    ) -> Result<String, ReasonerFailure> {
        self.0.closing_narrative(ctx, disposition)
    }
}

impl aicity_justice::JudgeReasoner for JusticeAdapter<'_> {
    fn judge(&mut self, brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
        self.0.judge(brief)
    }
}

// ---------------------------------------------------------------------------
// Stub implementations
// ---------------------------------------------------------------------------

/// Fails every call. The engine must keep ticking on role-default
/// fallbacks alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineReasoner;

impl ReasoningService for OfflineReasoner {
    fn decide(&mut self, _request: &DecisionRequest) -> Result<Decision, ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }

    fn choose_role(
        &mut self,
        _request: &GraduationRequest,
    ) -> Result<(Role, String), ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }

    fn investigate(
        &mut self,
        _ctx: &InvestigationContext,
    ) -> Result<VerdictNote, ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }

    fn closing_narrative(
        &mut self,
        _ctx: &InvestigationContext,
        _disposition: &str,
    ) -> Result<String, ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }

    fn judge(&mut self, _brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }

    fn write_narrative(
        &mut self,
        _request: &NarrativeRequest,
    ) -> Result<String, ReasonerFailure> {
        Err(ReasonerFailure(String::from("reasoning offline")))
    }
}

/// Deterministic test double: per-agent decision queues with optional
/// fixed answers for the other surfaces.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReasoner {
    /// Per-agent-name decision queues, popped in order.
    pub decisions: BTreeMap<String, VecDeque<Decision>>,
    /// Used when an agent's queue is empty.
    pub default_decision: Option<Decision>,
    pub verdict_note: Option<VerdictNote>,
    pub ruling: Option<JudgeRuling>,
    pub role_choice: Option<(Role, String)>,
    pub narrative: Option<String>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a decision for an agent by name.
    pub fn push_decision(&mut self, agent_name: &str, decision: Decision) {
        self.decisions
            .entry(agent_name.to_owned())
            .or_default()
            .push_back(decision);
    }
}

impl ReasoningService for ScriptedReasoner {
    fn decide(&mut self, request: &DecisionRequest) -> Result<Decision, ReasonerFailure> {
        if let Some(queue) = self.decisions.get_mut(&request.agent_name)
            && let Some(decision) = queue.pop_front()
        {
            return Ok(decision);
        }
        self.default_decision
            .clone()
            .ok_or_else(|| ReasonerFailure(String::from("no scripted decision")))
    }

    fn choose_role(
        &mut self,
        _request: &GraduationRequest,
    ) -> Result<(Role, String), ReasonerFailure> {
        self.role_choice
            .clone()
            .ok_or_else(|| ReasonerFailure(String::from("no scripted role choice")))
    }

    fn investigate(
        &mut self,
        _ctx: &InvestigationContext,
    ) -> Result<VerdictNote, ReasonerFailure> {
        self.verdict_note
            .clone()
            .ok_or_else(|| ReasonerFailure(String::from("no scripted verdict note")))
    }

    fn closing_narrative(
        &mut self,
        _ctx: &InvestigationContext,
        disposition: &str,
    ) -> Result<String, ReasonerFailure> {
        Ok(format!("The file is closed as {disposition}."))
    }

    fn judge(&mut self, _brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
        self.ruling
            .clone()
            .ok_or_else(|| ReasonerFailure(String::from("no scripted ruling")))
    }

    fn write_narrative(
        &mut self,
        request: &NarrativeRequest,
    ) -> Result<String, ReasonerFailure> {
        self.narrative.clone().ok_or_else(|| {
            ReasonerFailure(format!("no scripted narrative for day {}", request.day))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicity_types::ActionKind;

    #[test]
    fn scripted_decisions_pop_in_order() {
        let mut reasoner = ScriptedReasoner::new();
        let work = Decision {
            action: ActionKind::Work,
            details: String::new(),
            target: None,
            message_to: None,
            message_body: None,
            mood_self: String::new(),
            rationale: String::new(),
        };
        let rest = Decision {
            action: ActionKind::Rest,
            ..work.clone()
        };
        reasoner.push_decision("Marcus Vale", work.clone());
        reasoner.push_decision("Marcus Vale", rest.clone());

        let request = DecisionRequest {
            day: 1,
            time_phase: aicity_types::TimePhase::Midday,
            agent_name: String::from("Marcus Vale"),
            role: Role::Builder,
            tokens: 1000,
            age_days: 0,
            mood_text: String::from("steady"),
            susceptibility_framing: None,
            comprehension: None,
            newspaper: String::new(),
            standing_assets: Vec::new(),
            inbox: Vec::new(),
            bonds: Vec::new(),
            recalls: Vec::new(),
            available_actions: Vec::new(),
        };
        assert_eq!(reasoner.decide(&request).ok(), Some(work));
        assert_eq!(reasoner.decide(&request).ok(), Some(rest));
        assert!(reasoner.decide(&request).is_err());
    }

    #[test]
    fn offline_reasoner_always_fails() {
        let mut reasoner = OfflineReasoner;
        let brief = TrialBrief {
            day: 1,
            defendant_name: String::from("x"),
            charge: String::from("theft"),
            prior_offenses: 0,
            case_notes: Vec::new(),
        };
        assert!(reasoner.judge(&brief).is_err());
    }
}
