//! The [`CaseBook`]: police case records and their lifecycle.
//!
//! ```text
//! [open] --daily investigation------------> [open]
//! [open] --arrest + verdict(guilty)-------> [solved]
//! [open] --arrest + verdict(not guilty)---> [open]    (evidence re-weighed)
//! [open] --no new evidence for K days-----> [cold]
//! [cold] --new evidence linked------------> [open]    (reopened)
//! ```
//!
//! The cold-case clock runs from the most recent evidence reference, not
//! the opening day.

use rust_decimal::Decimal;
use tracing::info;

use aicity_types::{AgentId, CaseId, CaseNote, CaseStatus, EventId, PoliceCase};

use crate::JusticeError;

/// All police cases, open and closed.
#[derive(Debug, Clone, Default)]
pub struct CaseBook {
    cases: Vec<PoliceCase>,
}

impl CaseBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cases(cases: Vec<PoliceCase>) -> Self {
        Self { cases }
    }

    pub fn all(&self) -> &[PoliceCase] {
        &self.cases
    }

    pub fn get(&self, id: CaseId) -> Option<&PoliceCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    pub fn open_cases(&self) -> Vec<&PoliceCase> {
        self.cases
            .iter()
            .filter(|c| c.status == CaseStatus::Open)
            .collect()
    }

    pub fn open_case_count(&self) -> usize {
        self.open_cases().len()
    }

    /// The case (any status) tied to a trigger event.
    pub fn case_for_event(&self, event: EventId) -> Option<&PoliceCase> {
        self.cases
            .iter()
            .find(|c| c.trigger_event == event || c.evidence_refs.contains(&event))
    }

    /// Open a case for a reported event, or return the existing one.
    pub fn open(
        &mut self,
        day: u32,
        trigger_event: EventId,
        complainant: AgentId,
    ) -> CaseId {
        if let Some(existing) = self.case_for_event(trigger_event) {
            let id = existing.id;
            // New report on a known event counts as evidence; reopen if cold.
            let _ = self.link_evidence(id, trigger_event, day);
            return id;
        }
        let case = PoliceCase {
            id: CaseId::new(),
            day_opened: day,
            trigger_event,
            complainant,
            suspect_set: Vec::new(),
            evidence_refs: vec![trigger_event],
            last_evidence_day: day,
            status: CaseStatus::Open,
            notes: Vec::new(),
            day_closed: None,
            closing_report: None,
        };
        let id = case.id;
        info!(case = %id, complainant = %complainant, day, "case opened");
        self.cases.push(case);
        id
    }

    /// Link an evidence event to a case. Resets the cold clock and reopens
    /// a cold case.
    pub fn link_evidence(
        &mut self,
        id: CaseId,
        event: EventId,
        day: u32,
    ) -> Result<(), JusticeError> {
        let case = self.get_mut(id)?;
        if !case.evidence_refs.contains(&event) {
            case.evidence_refs.push(event);
        }
        if day > case.last_evidence_day {
            case.last_evidence_day = day;
        }
        if case.status == CaseStatus::Cold {
            case.status = CaseStatus::Open;
            case.day_closed = None;
            case.closing_report = None;
            info!(case = %id, day, "cold case reopened on new evidence");
        }
        Ok(())
    }

    /// Append a daily investigation note and fold its suspects into the
    /// suspect set.
    pub fn add_note(&mut self, id: CaseId, note: CaseNote) -> Result<(), JusticeError> {
        let case = self.get_mut(id)?;
        for suspect in &note.suspects {
            if !case.suspect_set.contains(suspect) {
                case.suspect_set.push(*suspect);
            }
        }
        case.notes.push(note);
        Ok(())
    }

    /// Open cases whose evidence has gone stale for `cold_days`.
    pub fn due_cold(&self, day: u32, cold_days: u32) -> Vec<CaseId> {
        self.cases
            .iter()
            .filter(|c| c.status == CaseStatus::Open)
            .filter(|c| day.saturating_sub(c.last_evidence_day) >= cold_days)
            .map(|c| c.id)
            .collect()
    }

    /// Close a case cold, with the officer's closing narrative.
    pub fn close_cold(
        &mut self,
        id: CaseId,
        day: u32,
        closing_report: String,
    ) -> Result<AgentId, JusticeError> {
        let case = self.get_mut(id)?;
        if case.status != CaseStatus::Open {
            return Err(JusticeError::WrongStatus {
                case: id,
                status: case.status,
                requires: "open",
            });
        }
        case.status = CaseStatus::Cold;
        case.day_closed = Some(day);
        case.closing_report = Some(closing_report);
        info!(case = %id, day, "case went cold");
        Ok(case.complainant)
    }

    /// Close a case as solved after a guilty verdict.
    pub fn solve(
        &mut self,
        id: CaseId,
        day: u32,
        closing_report: String,
    ) -> Result<(), JusticeError> {
        let case = self.get_mut(id)?;
        case.status = CaseStatus::Solved;
        case.day_closed = Some(day);
        case.closing_report = Some(closing_report);
        info!(case = %id, day, "case solved");
        Ok(())
    }

    /// A not-guilty verdict leaves the case open; the evidence gets
    /// re-weighed with a note.
    pub fn record_acquittal(&mut self, id: CaseId, day: u32) -> Result<(), JusticeError> {
        let case = self.get_mut(id)?;
        case.notes.push(CaseNote {
            day,
            text: String::from(
                "The court returned not guilty. Re-weighing the evidence from the start.",
            ),
            suspects: Vec::new(),
            confidence: Decimal::ZERO,
        });
        Ok(())
    }

    /// Cases touched on `day`, for the persistence delta.
    pub fn changed_on(&self, day: u32) -> Vec<&PoliceCase> {
        self.cases
            .iter()
            .filter(|c| {
                c.day_opened == day
                    || c.day_closed == Some(day)
                    || c.notes.iter().any(|n| n.day == day)
                    || c.last_evidence_day == day
            })
            .collect()
    }

    fn get_mut(&mut self, id: CaseId) -> Result<&mut PoliceCase, JusticeError> {
        self.cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(JusticeError::UnknownCase(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn book_with_case(day: u32) -> (CaseBook, CaseId, EventId, AgentId) {
        let mut book = CaseBook::new();
        let event = EventId::new();
        let complainant = AgentId::new();
        let id = book.open(day, event, complainant);
        (book, id, event, complainant)
    }

    #[test]
    fn opening_twice_links_instead() {
        let (mut book, id, event, complainant) = book_with_case(2);
        let again = book.open(5, event, complainant);
        assert_eq!(id, again);
        assert_eq!(book.all().len(), 1);
        // The duplicate report refreshed the evidence clock.
        assert_eq!(book.get(id).unwrap().last_evidence_day, 5);
    }

    #[test]
    fn cold_clock_runs_from_last_evidence() {
        let (mut book, id, _, _) = book_with_case(2);
        book.link_evidence(id, EventId::new(), 10).unwrap();
        // 14 days from day 10, not day 2.
        assert!(book.due_cold(23, 14).is_empty());
        assert_eq!(book.due_cold(24, 14), vec![id]);
    }

    #[test]
    fn new_evidence_reopens_a_cold_case() {
        let (mut book, id, _, _) = book_with_case(1);
        book.close_cold(id, 16, String::from("No leads.")).unwrap();
        assert_eq!(book.get(id).unwrap().status, CaseStatus::Cold);

        book.link_evidence(id, EventId::new(), 25).unwrap();
        let case = book.get(id).unwrap();
        assert_eq!(case.status, CaseStatus::Open);
        assert!(case.day_closed.is_none());
        assert_eq!(case.last_evidence_day, 25);
    }

    #[test]
    fn notes_accumulate_suspects() {
        let (mut book, id, _, _) = book_with_case(1);
        let suspect = AgentId::new();
        book.add_note(
            id,
            CaseNote {
                day: 2,
                text: String::from("A name keeps coming up."),
                suspects: vec![suspect],
                confidence: Decimal::new(4, 1),
            },
        )
        .unwrap();
        book.add_note(
            id,
            CaseNote {
                day: 3,
                text: String::from("Same name again."),
                suspects: vec![suspect],
                confidence: Decimal::new(6, 1),
            },
        )
        .unwrap();
        let case = book.get(id).unwrap();
        assert_eq!(case.suspect_set, vec![suspect]);
        assert_eq!(case.notes.len(), 2);
    }

    #[test]
    fn solved_cases_keep_their_report() {
        let (mut book, id, _, _) = book_with_case(1);
        book.solve(id, 7, String::from("Conviction secured.")).unwrap();
        let case = book.get(id).unwrap();
        assert_eq!(case.status, CaseStatus::Solved);
        assert_eq!(case.day_closed, Some(7));
        assert!(case.closing_report.is_some());
    }

    #[test]
    fn closing_a_cold_case_twice_fails() {
        let (mut book, id, _, _) = book_with_case(1);
        book.close_cold(id, 16, String::from("No leads.")).unwrap();
        assert!(matches!(
            book.close_cold(id, 17, String::from("again")),
            Err(JusticeError::WrongStatus { .. })
        ));
    }
}
