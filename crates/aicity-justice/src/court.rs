//! The court: queued arrests become trials, trials become verdicts.
//!
//! The judge is the reasoning model, but sentencing is post-processed:
//! convictions are floored by the severity heuristics so a lenient or
//! confused ruling still carries a meaningful fine and sentence, scaled
//! by prior offenses. A guilty verdict fines the defendant (the scheduler
//! moves the money), solves the linked case, publishes the trigger event,
//! and breaks any gang the defendant led. When the judge cannot be
//! reached or parsed, the defendant walks: presumption of innocence is
//! the fallback path.

use tracing::{info, warn};

use aicity_types::{AgentId, CaseId};

use crate::investigation::ReasonerFailure;

/// An arrest waiting for trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTrial {
    /// The case behind the arrest, when one exists (patrol arrests may
    /// precede any report).
    pub case: Option<CaseId>,
    pub defendant: AgentId,
    pub defendant_name: String,
    pub officer: AgentId,
    pub reason: String,
    pub day_filed: u32,
    pub prior_offenses: u32,
}

/// What the judge sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialBrief {
    pub day: u32,
    pub defendant_name: String,
    pub charge: String,
    pub prior_offenses: u32,
    /// Case-note excerpts, when a case backs the charge.
    pub case_notes: Vec<String>,
}

/// The judge's ruling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialVerdict {
    pub case: Option<CaseId>,
    pub defendant: AgentId,
    pub guilty: bool,
    /// Fine in tokens, transferred to the vault on conviction.
    pub fine: u64,
    /// Days of imprisonment.
    pub sentence_days: u32,
    pub statement: String,
}

/// The model surface the court drives.
pub trait JudgeReasoner {
    /// Rule on one trial; returns guilty, fine, sentence, and a statement.
    fn judge(&mut self, brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure>;
}

/// The parsed ruling from the judge model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeRuling {
    pub guilty: bool,
    pub fine: u64,
    pub sentence_days: u32,
    pub statement: String,
}

/// Severity floor applied to convictions so fines stay meaningful.
const MIN_FINE: u64 = 100;

/// The trial queue.
#[derive(Debug, Clone, Default)]
pub struct Court {
    pending: Vec<PendingTrial>,
}

impl Court {
    pub fn new() -> Self {
        Self::default()
    }

    /// File an arrest for trial on the next day.
    pub fn file(&mut self, trial: PendingTrial) {
        info!(defendant = %trial.defendant_name, day = trial.day_filed, "arrest filed for trial");
        self.pending.push(trial);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Try every pending arrest filed before `day`. Returns the verdicts;
    /// applying their consequences (fine transfer, case closure, gang
    /// collapse, mood) is the scheduler's job.
    pub fn process_pending(
        &mut self,
        day: u32,
        judge: &mut dyn JudgeReasoner,
        case_notes_for: impl Fn(CaseId) -> Vec<String>,
    ) -> Vec<TrialVerdict> {
        let due: Vec<PendingTrial> = {
            let (due, rest) = self
                .pending
                .drain(..)
                .partition(|t| t.day_filed < day);
            self.pending = rest;
            due
        };

        let mut verdicts = Vec::with_capacity(due.len());
        for trial in due {
            let brief = TrialBrief {
                day,
                defendant_name: trial.defendant_name.clone(),
                charge: trial.reason.clone(),
                prior_offenses: trial.prior_offenses,
                case_notes: trial.case.map(&case_notes_for).unwrap_or_default(),
            };
            let ruling = match judge.judge(&brief) {
                Ok(ruling) => ruling,
                Err(err) => {
                    warn!(defendant = %trial.defendant_name, %err,
                          "judge unavailable; defendant walks");
                    JudgeRuling {
                        guilty: false,
                        fine: 0,
                        sentence_days: 0,
                        statement: String::from(
                            "The court could not convene. The defendant is released.",
                        ),
                    }
                }
            };

            // Floor lenient rulings by the severity heuristics: repeat
            // offenders pay more and serve longer, whatever the model said.
            let (fine, sentence_days) = if ruling.guilty {
                (
                    ruling
                        .fine
                        .max(suggested_fine(MIN_FINE, trial.prior_offenses)),
                    ruling
                        .sentence_days
                        .max(suggested_sentence(trial.prior_offenses)),
                )
            } else {
                (0, 0)
            };
            info!(
                defendant = %trial.defendant_name,
                guilty = ruling.guilty,
                fine,
                sentence_days,
                "verdict issued"
            );
            verdicts.push(TrialVerdict {
                case: trial.case,
                defendant: trial.defendant,
                guilty: ruling.guilty,
                fine,
                sentence_days,
                statement: ruling.statement,
            });
        }
        verdicts
    }
}

/// The fine floor applied to a conviction: repeat offenders pay more.
pub fn suggested_fine(base: u64, prior_offenses: u32) -> u64 {
    base + u64::from(prior_offenses) * 100
}

/// The sentence floor applied to a conviction: short stays, longer for
/// repeat offenders.
pub fn suggested_sentence(prior_offenses: u32) -> u32 {
    2 + prior_offenses
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct ScriptedJudge {
        guilty: bool,
        fine: u64,
        sentence_days: u32,
    }

    impl JudgeReasoner for ScriptedJudge {
        fn judge(&mut self, brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
            Ok(JudgeRuling {
                guilty: self.guilty,
                fine: self.fine,
                sentence_days: self.sentence_days,
                statement: format!("The court has weighed the matter of {}.", brief.defendant_name),
            })
        }
    }

    fn guilty_judge(fine: u64, sentence_days: u32) -> ScriptedJudge {
        ScriptedJudge {
            guilty: true,
            fine,
            sentence_days,
        }
    }

    struct UnreachableJudge;
    impl JudgeReasoner for UnreachableJudge {
        fn judge(&mut self, _brief: &TrialBrief) -> Result<JudgeRuling, ReasonerFailure> {
            Err(ReasonerFailure(String::from("timeout")))
        }
    }

    fn trial(day: u32, priors: u32) -> PendingTrial {
        PendingTrial {
            case: None,
            defendant: AgentId::new(),
            defendant_name: String::from("Renn Voss"),
            officer: AgentId::new(),
            reason: String::from("theft"),
            day_filed: day,
            prior_offenses: priors,
        }
    }

    #[test]
    fn trials_wait_one_day() {
        let mut court = Court::new();
        court.file(trial(4, 0));
        let mut judge = guilty_judge(300, 3);
        // Same day: nothing is tried yet.
        assert!(court.process_pending(4, &mut judge, |_| Vec::new()).is_empty());
        assert_eq!(court.pending_count(), 1);
        // Next day: the verdict lands, untouched by the floors.
        let verdicts = court.process_pending(5, &mut judge, |_| Vec::new());
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].guilty);
        assert_eq!(verdicts[0].fine, 300);
        assert_eq!(verdicts[0].sentence_days, 3);
        assert_eq!(court.pending_count(), 0);
    }

    #[test]
    fn lenient_rulings_are_floored() {
        let mut court = Court::new();
        court.file(trial(4, 0));
        // A token fine and no sentence from the model still convict at
        // the minimum severity.
        let mut judge = guilty_judge(10, 0);
        let verdicts = court.process_pending(5, &mut judge, |_| Vec::new());
        assert_eq!(verdicts[0].fine, 100);
        assert_eq!(verdicts[0].sentence_days, 2);
    }

    #[test]
    fn repeat_offenders_pay_more() {
        let mut court = Court::new();
        court.file(trial(4, 3));
        let mut judge = guilty_judge(0, 0);
        let verdicts = court.process_pending(5, &mut judge, |_| Vec::new());
        // Three priors raise the floors: 100 + 3 * 100 and 2 + 3 days.
        assert_eq!(verdicts[0].fine, 400);
        assert_eq!(verdicts[0].sentence_days, 5);
    }

    #[test]
    fn unreachable_judge_acquits() {
        let mut court = Court::new();
        court.file(trial(4, 0));
        let mut judge = UnreachableJudge;
        let verdicts = court.process_pending(5, &mut judge, |_| Vec::new());
        assert_eq!(verdicts.len(), 1);
        assert!(!verdicts[0].guilty);
        assert_eq!(verdicts[0].fine, 0);
    }

    #[test]
    fn acquittal_carries_no_fine_or_sentence() {
        let mut court = Court::new();
        court.file(trial(4, 0));
        let mut judge = ScriptedJudge {
            guilty: false,
            fine: 300,
            sentence_days: 3,
        };
        let verdicts = court.process_pending(5, &mut judge, |_| Vec::new());
        assert!(!verdicts[0].guilty);
        assert_eq!(verdicts[0].fine, 0);
        assert_eq!(verdicts[0].sentence_days, 0);
    }
}
