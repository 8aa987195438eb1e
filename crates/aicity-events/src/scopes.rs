//! Scoped queries over the event log.
//!
//! Each query names its caller and returns only events at or below the
//! caller's permitted visibility. The narrator scope is the strictest and
//! admits no exception: the newspaper is always behind the truth.

use aicity_types::{AgentId, Event, EventKind, Visibility};

use crate::log::EventLog;

/// Filters for the police evidence query.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoliceFilter {
    /// Restrict to events where this agent is actor or target.
    pub suspect: Option<AgentId>,
    /// Restrict to events against this target.
    pub target: Option<AgentId>,
    /// Restrict to one event kind.
    pub kind: Option<EventKind>,
    /// Earliest day to include.
    pub since_day: u32,
}

impl EventLog {
    /// **Narrator scope**: `PUBLIC` events only. The one scope the
    /// newspaper sees; no exception may be introduced.
    pub fn narrator_scope(&self, since_day: u32) -> Vec<&Event> {
        self.all()
            .iter()
            .filter(|e| e.visibility == Visibility::Public && e.day >= since_day)
            .collect()
    }

    /// **Police scope**: `WITNESSED | REPORTED | PUBLIC`. Never `PRIVATE`
    /// or `RUMOR` -- rumor is not yet in the book.
    pub fn police_scope(&self, filter: PoliceFilter) -> Vec<&Event> {
        self.all()
            .iter()
            .filter(|e| {
                matches!(
                    e.visibility,
                    Visibility::Witnessed | Visibility::Reported | Visibility::Public
                )
            })
            .filter(|e| e.day >= filter.since_day)
            .filter(|e| {
                filter
                    .suspect
                    .is_none_or(|s| e.actor == s || e.target == Some(s))
            })
            .filter(|e| filter.target.is_none_or(|t| e.target == Some(t)))
            .filter(|e| filter.kind.is_none_or(|k| e.kind == k))
            .collect()
    }

    /// All `REPORTED` events since a day -- the complaint feed the case
    /// book scans for new cases.
    pub fn reported_scope(&self, since_day: u32) -> Vec<&Event> {
        self.all()
            .iter()
            .filter(|e| e.visibility == Visibility::Reported && e.day >= since_day)
            .collect()
    }

    /// **Agent scope**: events where the agent is actor, target, or in the
    /// witness set, plus everything `PUBLIC`.
    pub fn agent_scope(&self, agent: AgentId, since_day: u32) -> Vec<&Event> {
        self.all()
            .iter()
            .filter(|e| e.day >= since_day)
            .filter(|e| {
                e.visibility == Visibility::Public
                    || e.actor == agent
                    || e.target == Some(agent)
                    || e.witnesses.contains(&agent)
                    || e.rumor_recipients.contains(&agent)
            })
            .collect()
    }

    /// Crimes against a victim that are not yet reported, for the victim
    /// self-discovery roll. The victim does not learn WHO did it -- only
    /// that something happened.
    pub fn unreported_crimes_against(
        &self,
        victim: AgentId,
        since_day: u32,
    ) -> Vec<&Event> {
        self.all()
            .iter()
            .filter(|e| e.target == Some(victim))
            .filter(|e| {
                matches!(
                    e.kind,
                    EventKind::Theft | EventKind::Assault | EventKind::Blackmail
                )
            })
            .filter(|e| e.visibility < Visibility::Reported)
            .filter(|e| e.day >= since_day)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seeded_log() -> (EventLog, AgentId, AgentId, AgentId) {
        let mut log = EventLog::new();
        let thief = AgentId::new();
        let victim = AgentId::new();
        let witness = AgentId::new();

        let private = log.record(
            1,
            EventKind::Theft,
            thief,
            Some(victim),
            None,
            "a quiet theft",
            Visibility::Private,
        );
        let _ = log.add_witnesses(private, &[witness]);

        let rumor = log.record(
            2,
            EventKind::Blackmail,
            thief,
            Some(victim),
            None,
            "pressure in the alley",
            Visibility::Private,
        );
        let _ = log.note_rumor(rumor, 2, witness, victim, "someone is being squeezed");

        let reported = log.record(
            2,
            EventKind::Assault,
            thief,
            Some(victim),
            None,
            "a scuffle",
            Visibility::Private,
        );
        let _ = log.file_report(reported, 3, victim);

        let public = log.record(
            3,
            EventKind::Verdict,
            thief,
            None,
            None,
            "guilty as charged",
            Visibility::Public,
        );
        let _ = public;

        (log, thief, victim, witness)
    }

    #[test]
    fn narrator_sees_public_only() {
        let (log, ..) = seeded_log();
        let visible = log.narrator_scope(0);
        assert_eq!(visible.len(), 1);
        assert!(visible.iter().all(|e| e.visibility == Visibility::Public));
    }

    #[test]
    fn police_never_see_private_or_rumor() {
        let (log, ..) = seeded_log();
        let visible = log.police_scope(PoliceFilter::default());
        assert!(visible.iter().all(|e| {
            matches!(
                e.visibility,
                Visibility::Witnessed | Visibility::Reported | Visibility::Public
            )
        }));
        // The rumor-stage blackmail is excluded.
        assert!(!visible.iter().any(|e| e.kind == EventKind::Blackmail));
    }

    #[test]
    fn police_filter_by_suspect() {
        let (log, thief, ..) = seeded_log();
        let visible = log.police_scope(PoliceFilter {
            suspect: Some(thief),
            ..PoliceFilter::default()
        });
        assert!(!visible.is_empty());
        assert!(visible
            .iter()
            .all(|e| e.actor == thief || e.target == Some(thief)));
    }

    #[test]
    fn agent_scope_includes_own_and_public() {
        let (log, _, victim, _) = seeded_log();
        let visible = log.agent_scope(victim, 0);
        // Victim sees all three crimes against them plus the public verdict.
        assert_eq!(visible.len(), 4);

        let stranger = AgentId::new();
        let stranger_view = log.agent_scope(stranger, 0);
        assert_eq!(stranger_view.len(), 1);
        assert_eq!(stranger_view[0].visibility, Visibility::Public);
    }

    #[test]
    fn victim_discovery_excludes_reported() {
        let (log, _, victim, _) = seeded_log();
        let discoverable = log.unreported_crimes_against(victim, 0);
        // The assault is already reported; theft and blackmail remain.
        assert_eq!(discoverable.len(), 2);
    }
}
