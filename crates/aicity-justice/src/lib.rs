//! The police complaint book and the court.
//!
//! Every reported crime opens a case. The investigating officer works each
//! open case daily with only the evidence the visibility machine lets them
//! see -- no god-view. Cases close as solved (after a conviction) or cold
//! (no new evidence for the cold-case window), and cold cases reopen when
//! new evidence is linked.

pub mod cases;
pub mod court;
pub mod investigation;

pub use cases::CaseBook;
pub use court::{Court, JudgeReasoner, JudgeRuling, PendingTrial, TrialBrief, TrialVerdict};
pub use investigation::{
    CaseReasoner, InvestigationConfig, InvestigationContext, InvestigationReport, ReasonerFailure,
    VerdictNote, build_context, susceptibility_framing,
};

use aicity_types::CaseId;

/// Errors from case-book operations.
#[derive(Debug, thiserror::Error)]
pub enum JusticeError {
    /// No case with this id exists.
    #[error("unknown case {0}")]
    UnknownCase(CaseId),

    /// The operation is invalid for the case's current status.
    #[error("case {case} is {status:?}; operation requires {requires}")]
    WrongStatus {
        case: CaseId,
        status: aicity_types::CaseStatus,
        requires: &'static str,
    },
}
