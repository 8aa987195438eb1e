//! The daily investigation cycle.
//!
//! For each open case the officer gathers police-scope evidence and ledger
//! records around the event window, hands them to the reasoning model, and
//! parses a structured verdict-note back. High-confidence notes with an
//! arrest request queue a trial. Stale cases go cold with a closing
//! narrative written from the same limited evidence.
//!
//! The officer's bribe susceptibility conditions only the prompt framing
//! (honest / pragmatic / corrupt); the number itself never leaves the
//! engine.

use rust_decimal::Decimal;
use tracing::{info, warn};

use aicity_events::EventLog;
use aicity_events::scopes::PoliceFilter;
use aicity_types::{AgentId, CaseId, CaseNote, CaseStatus, Visibility};

use crate::cases::CaseBook;

/// A reasoning failure: timeout, transport error, or unparseable output.
/// Always recovered locally -- the day tick proceeds.
#[derive(Debug, thiserror::Error)]
#[error("reasoning call failed: {0}")]
pub struct ReasonerFailure(pub String);

/// The structured note parsed from the investigation model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictNote {
    /// Investigator confidence in [0, 1].
    pub confidence: Decimal,
    /// Suspect names, strongest first.
    pub suspect_rank: Vec<String>,
    /// What the officer plans to do next.
    pub next_actions: String,
    pub case_note_text: String,
    pub request_arrest: bool,
}

/// Everything the investigation model is allowed to see for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestigationContext {
    pub day: u32,
    pub officer_name: String,
    /// "honest" / "pragmatic" / "corrupt" -- never the number.
    pub officer_framing: String,
    pub case_id: CaseId,
    pub day_opened: u32,
    /// Rendered police-scope evidence lines.
    pub evidence_lines: Vec<String>,
    /// Rendered ledger records around the event window.
    pub ledger_lines: Vec<String>,
    /// The last few case notes.
    pub prior_notes: Vec<String>,
    /// Names of living citizens (the suspect universe).
    pub citizen_names: Vec<String>,
}

/// The model surface the case engine drives. Implemented by the LLM
/// runner in production and by scripted stubs in tests.
pub trait CaseReasoner {
    /// Investigate one open case; returns a structured verdict-note.
    fn investigate(&mut self, ctx: &InvestigationContext) -> Result<VerdictNote, ReasonerFailure>;

    /// Write the closing narrative for a case, from police-scope evidence
    /// only. `disposition` is "cold" or "solved".
    fn closing_narrative(
        &mut self,
        ctx: &InvestigationContext,
        disposition: &str,
    ) -> Result<String, ReasonerFailure>;
}

/// Investigation tunables from the city configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestigationConfig {
    /// Days without new evidence before a case goes cold.
    pub cold_case_days: u32,
    /// Confidence at or above which an arrest request is honored.
    pub arrest_threshold: Decimal,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            cold_case_days: 14,
            arrest_threshold: Decimal::new(65, 2),
        }
    }
}

/// What one day of investigation produced.
#[derive(Debug, Clone, Default)]
pub struct InvestigationReport {
    /// (case, suspect name, reason) triples to hand to the court.
    pub arrest_requests: Vec<(CaseId, String, String)>,
    /// Complainants whose cases went cold today (they take the mood hit).
    pub cold_case_complainants: Vec<AgentId>,
}

/// Descriptive framing for an officer's bribe susceptibility. The number
/// stays inside the engine; only the tone reaches the prompt.
pub fn susceptibility_framing(susceptibility: Decimal) -> &'static str {
    if susceptibility < Decimal::new(33, 2) {
        "honest"
    } else if susceptibility < Decimal::new(66, 2) {
        "pragmatic"
    } else {
        "corrupt"
    }
}

/// Run the daily investigation over every open case.
///
/// `officer` is the investigating police agent; `officer_bribed` is true
/// when a bribe around an active case window was accepted this tick --
/// confidence is dampened and arrests are suppressed, biasing the file
/// toward a cold resolution.
#[allow(clippy::too_many_arguments)]
pub fn run_daily(
    book: &mut CaseBook,
    events: &EventLog,
    reasoner: &mut dyn CaseReasoner,
    config: &InvestigationConfig,
    day: u32,
    officer_name: &str,
    officer_framing: &str,
    officer_bribed: bool,
    ledger_lines_for: impl Fn(u32, u32) -> Vec<String>,
    citizen_names: &[String],
    resolve_name: impl Fn(&str) -> Option<AgentId>,
) -> InvestigationReport {
    let mut report = InvestigationReport::default();

    // Link any new police-scope evidence to its case before the cold
    // check; fresh evidence resets the clock and reopens cold cases.
    let case_ids: Vec<CaseId> = book.all().iter().map(|c| c.id).collect();
    for case_id in &case_ids {
        let Some(case) = book.get(*case_id) else {
            continue;
        };
        let complainant = case.complainant;
        let since = case.last_evidence_day;
        let fresh: Vec<(aicity_types::EventId, u32)> = events
            .police_scope(PoliceFilter {
                target: Some(complainant),
                since_day: since + 1,
                ..PoliceFilter::default()
            })
            .iter()
            .map(|e| (e.id, e.day))
            .collect();
        for (event_id, event_day) in fresh {
            let _ = book.link_evidence(*case_id, event_id, event_day);
        }
    }

    // Cold pass.
    for case_id in book.due_cold(day, config.cold_case_days) {
        let ctx = build_context(
            book,
            events,
            case_id,
            day,
            officer_name,
            officer_framing,
            &ledger_lines_for,
            citizen_names,
        );
        let narrative = match ctx
            .as_ref()
            .map(|c| reasoner.closing_narrative(c, "cold"))
        {
            Some(Ok(text)) => text,
            _ => format!(
                "Case closed cold on day {day}. The evidence available to this office was \
                 not sufficient to name a suspect. The file remains open to new information."
            ),
        };
        if let Ok(complainant) = book.close_cold(case_id, day, narrative) {
            report.cold_case_complainants.push(complainant);
        }
    }

    // Investigation pass.
    let open: Vec<CaseId> = book.open_cases().iter().map(|c| c.id).collect();
    for case_id in open {
        let Some(ctx) = build_context(
            book,
            events,
            case_id,
            day,
            officer_name,
            officer_framing,
            &ledger_lines_for,
            citizen_names,
        ) else {
            continue;
        };

        let mut note = match reasoner.investigate(&ctx) {
            Ok(note) => note,
            Err(err) => {
                warn!(case = %case_id, %err, "investigation call failed; no note today");
                continue;
            }
        };

        if officer_bribed {
            // The file drifts toward inconclusive.
            note.confidence *= Decimal::new(5, 1);
            note.request_arrest = false;
        }

        let suspects: Vec<AgentId> = note
            .suspect_rank
            .iter()
            .filter_map(|name| resolve_name(name))
            .collect();
        let _ = book.add_note(
            case_id,
            CaseNote {
                day,
                text: note.case_note_text.clone(),
                suspects: suspects.clone(),
                confidence: note.confidence,
            },
        );

        if note.request_arrest && note.confidence >= config.arrest_threshold {
            if let Some(prime) = note.suspect_rank.first() {
                info!(case = %case_id, suspect = %prime, confidence = %note.confidence,
                      "arrest requested");
                report.arrest_requests.push((
                    case_id,
                    prime.clone(),
                    note.case_note_text.clone(),
                ));
            }
        }
    }

    report
}

/// Assemble the limited view the model gets for one open case: linked
/// evidence in police-visible states, the recent notes, and the ledger
/// window. Also used by the scheduler when writing the closing report of
/// a solved case, so convictions close on the same evidence the
/// investigation saw. Returns `None` once the case is no longer open.
#[allow(clippy::too_many_arguments)]
pub fn build_context(
    book: &CaseBook,
    events: &EventLog,
    case_id: CaseId,
    day: u32,
    officer_name: &str,
    officer_framing: &str,
    ledger_lines_for: &impl Fn(u32, u32) -> Vec<String>,
    citizen_names: &[String],
) -> Option<InvestigationContext> {
    let case = book.get(case_id)?;
    if case.status != CaseStatus::Open {
        return None;
    }

    let evidence_lines: Vec<String> = case
        .evidence_refs
        .iter()
        .filter_map(|id| events.get(*id))
        // Belt and braces: only police-visible states render into the
        // prompt, whatever got linked.
        .filter(|e| {
            matches!(
                e.visibility,
                Visibility::Witnessed | Visibility::Reported | Visibility::Public
            )
        })
        .map(|e| {
            format!(
                "[Day {}] [{}] {}{}",
                e.day,
                e.visibility.as_str(),
                e.description,
                if e.witnesses.is_empty() {
                    String::new()
                } else {
                    format!(" ({} witness(es) on record)", e.witnesses.len())
                }
            )
        })
        .collect();

    let prior_notes: Vec<String> = case
        .notes
        .iter()
        .rev()
        .take(5)
        .rev()
        .map(|n| format!("Day {}: {}", n.day, n.text))
        .collect();

    Some(InvestigationContext {
        day,
        officer_name: officer_name.to_owned(),
        officer_framing: officer_framing.to_owned(),
        case_id,
        day_opened: case.day_opened,
        evidence_lines,
        ledger_lines: ledger_lines_for(case.day_opened.saturating_sub(1), day),
        prior_notes,
        citizen_names: citizen_names.to_vec(),
    })
}
