//! The append-only [`EventLog`] and its promotion operations.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use tracing::{debug, info};

use aicity_types::{AgentId, AssetId, Event, EventId, EventKind, Visibility};

use crate::EventError;

/// Outcome of a promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The visibility advanced.
    Advanced,
    /// The event was already at (or past) the requested state. Promoting an
    /// event to its current state is a no-op.
    NoOp,
}

/// All events, in creation order, with promotion and trail operations.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
    index: BTreeMap<EventId, usize>,
    /// Events created or promoted since the last checkpoint drain. The
    /// scheduler is the sole place that clears this.
    dirty: BTreeSet<EventId>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted events (creation order preserved).
    pub fn from_events(events: Vec<Event>) -> Self {
        let index = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        Self {
            events,
            index,
            dirty: BTreeSet::new(),
        }
    }

    /// Number of recorded events.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, in creation order.
    pub fn all(&self) -> &[Event] {
        &self.events
    }

    /// Look up one event.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.index.get(&id).and_then(|&i| self.events.get(i))
    }

    /// Events created on the given day, in creation order.
    pub fn created_on(&self, day: u32) -> Vec<&Event> {
        self.events.iter().filter(|e| e.day == day).collect()
    }

    /// Record a new event. Most crimes start `Private`; openly visible acts
    /// (arrests, verdicts) start `Reported` or `Public`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        day: u32,
        kind: EventKind,
        actor: AgentId,
        target: Option<AgentId>,
        asset: Option<AssetId>,
        description: impl Into<String>,
        visibility: Visibility,
    ) -> EventId {
        let event = Event {
            id: EventId::new(),
            day,
            kind,
            actor,
            target,
            asset,
            description: description.into(),
            visibility,
            witnesses: Vec::new(),
            evidence_trail: Vec::new(),
            rumor_recipients: Vec::new(),
        };
        let id = event.id;
        debug!(day, ?kind, event = %id, ?visibility, "event recorded");
        self.index.insert(id, self.events.len());
        self.events.push(event);
        self.dirty.insert(id);
        id
    }

    // -----------------------------------------------------------------------
    // Promotions (forward only)
    // -----------------------------------------------------------------------

    /// Append witnesses to an event; promotes `Private -> Witnessed`.
    ///
    /// A witness arriving after the event has already advanced further is
    /// still recorded (their memory counts toward the knower threshold) but
    /// the visibility is untouched.
    pub fn add_witnesses(
        &mut self,
        id: EventId,
        witnesses: &[AgentId],
    ) -> Result<Promotion, EventError> {
        let event = self.get_mut(id)?;
        for w in witnesses {
            if !event.witnesses.contains(w) && *w != event.actor {
                event.witnesses.push(*w);
            }
        }
        if event.visibility == Visibility::Private && !event.witnesses.is_empty() {
            event.visibility = Visibility::Witnessed;
            return Ok(Promotion::Advanced);
        }
        Ok(Promotion::NoOp)
    }

    /// A witness gossips about the event in a message; promotes
    /// `Private | Witnessed -> Rumor` and stores the message body in the
    /// evidence trail.
    pub fn note_rumor(
        &mut self,
        id: EventId,
        day: u32,
        from: AgentId,
        to: AgentId,
        message_body: &str,
    ) -> Result<Promotion, EventError> {
        let event = self.get_mut(id)?;
        event.evidence_trail.push(json!({
            "rumor_from": from,
            "rumor_to": to,
            "on_day": day,
            "message": message_body,
        }));
        if !event.rumor_recipients.contains(&to) {
            event.rumor_recipients.push(to);
        }
        if event.visibility < Visibility::Rumor {
            event.visibility = Visibility::Rumor;
            return Ok(Promotion::Advanced);
        }
        Ok(Promotion::NoOp)
    }

    /// A victim or witness formally files with police; promotes to
    /// `Reported`.
    pub fn file_report(
        &mut self,
        id: EventId,
        day: u32,
        reporter: AgentId,
    ) -> Result<Promotion, EventError> {
        let event = self.get_mut(id)?;
        event.evidence_trail.push(json!({
            "reported_by": reporter,
            "reported_on_day": day,
        }));
        if event.visibility < Visibility::Reported {
            info!(event = %id, reporter = %reporter, day, "report filed");
            event.visibility = Visibility::Reported;
            return Ok(Promotion::Advanced);
        }
        Ok(Promotion::NoOp)
    }

    /// Explicit publication: court verdict, death announcement, or the
    /// knower threshold. From this point the newspaper may reference the
    /// event.
    pub fn publish(&mut self, id: EventId, reason: &str) -> Result<Promotion, EventError> {
        let event = self.get_mut(id)?;
        event.evidence_trail.push(json!({ "made_public_reason": reason }));
        if event.visibility < Visibility::Public {
            info!(event = %id, reason, "event made public");
            event.visibility = Visibility::Public;
            return Ok(Promotion::Advanced);
        }
        Ok(Promotion::NoOp)
    }

    /// Promote every event whose independent-knower count has reached the
    /// threshold. Returns the ids that went public.
    pub fn apply_knower_threshold(&mut self, threshold: usize) -> Vec<EventId> {
        let ready: Vec<EventId> = self
            .events
            .iter()
            .filter(|e| e.visibility < Visibility::Public && e.knower_count() >= threshold)
            .map(|e| e.id)
            .collect();
        for id in &ready {
            let _ = self.publish(*id, "knower_threshold");
        }
        ready
    }

    /// Append an arbitrary clue to the evidence trail without touching
    /// visibility.
    pub fn append_evidence(
        &mut self,
        id: EventId,
        clue: serde_json::Value,
    ) -> Result<(), EventError> {
        self.get_mut(id)?.evidence_trail.push(clue);
        Ok(())
    }

    /// Guard used by tests and callers that hold a raw target state: errors
    /// on any backward move, no-ops on the current state.
    pub fn request_visibility(
        &mut self,
        id: EventId,
        to: Visibility,
    ) -> Result<Promotion, EventError> {
        let current = self.get(id).ok_or(EventError::UnknownEvent(id))?.visibility;
        if to < current {
            return Err(EventError::VisibilityRegression {
                event: id,
                from: current,
                to,
            });
        }
        if to == current {
            return Ok(Promotion::NoOp);
        }
        let event = self.get_mut(id)?;
        event.visibility = to;
        Ok(Promotion::Advanced)
    }

    fn get_mut(&mut self, id: EventId) -> Result<&mut Event, EventError> {
        let i = self
            .index
            .get(&id)
            .copied()
            .ok_or(EventError::UnknownEvent(id))?;
        self.dirty.insert(id);
        self.events.get_mut(i).ok_or(EventError::UnknownEvent(id))
    }

    /// Drain the set of events created or promoted since the last drain,
    /// cloned for the persistence delta.
    pub fn drain_dirty(&mut self) -> Vec<Event> {
        let ids = std::mem::take(&mut self.dirty);
        ids.into_iter()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn theft(log: &mut EventLog) -> (EventId, AgentId, AgentId) {
        let thief = AgentId::new();
        let victim = AgentId::new();
        let id = log.record(
            3,
            EventKind::Theft,
            thief,
            Some(victim),
            None,
            "tokens went missing",
            Visibility::Private,
        );
        (id, thief, victim)
    }

    #[test]
    fn record_starts_at_requested_visibility() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Private);
    }

    #[test]
    fn witnesses_promote_private_to_witnessed() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        let w = AgentId::new();
        assert_eq!(
            log.add_witnesses(id, &[w]).unwrap(),
            Promotion::Advanced
        );
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Witnessed);
    }

    #[test]
    fn actor_is_never_a_witness_of_their_own_event() {
        let mut log = EventLog::new();
        let (id, thief, _) = theft(&mut log);
        let _ = log.add_witnesses(id, &[thief]).unwrap();
        assert!(log.get(id).unwrap().witnesses.is_empty());
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Private);
    }

    #[test]
    fn rumor_stores_the_message_in_the_trail() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        let w = AgentId::new();
        let friend = AgentId::new();
        let _ = log.add_witnesses(id, &[w]).unwrap();
        let outcome = log.note_rumor(id, 4, w, friend, "saw someone near the stalls").unwrap();
        assert_eq!(outcome, Promotion::Advanced);
        let event = log.get(id).unwrap();
        assert_eq!(event.visibility, Visibility::Rumor);
        assert!(event
            .evidence_trail
            .iter()
            .any(|v| v.get("message").is_some()));
    }

    #[test]
    fn report_opens_the_reported_state() {
        let mut log = EventLog::new();
        let (id, _, victim) = theft(&mut log);
        let _ = log.file_report(id, 4, victim).unwrap();
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Reported);
    }

    #[test]
    fn promotion_is_idempotent() {
        let mut log = EventLog::new();
        let (id, _, victim) = theft(&mut log);
        assert_eq!(
            log.file_report(id, 4, victim).unwrap(),
            Promotion::Advanced
        );
        assert_eq!(log.file_report(id, 5, victim).unwrap(), Promotion::NoOp);
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Reported);
    }

    #[test]
    fn backward_moves_are_rejected() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        let _ = log.publish(id, "court_verdict").unwrap();
        let result = log.request_visibility(id, Visibility::Rumor);
        assert!(matches!(
            result,
            Err(EventError::VisibilityRegression { .. })
        ));
    }

    #[test]
    fn knower_threshold_publishes() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        // actor + target = 2 knowers; add 3 witnesses to reach 5.
        let ws: Vec<AgentId> = (0..3).map(|_| AgentId::new()).collect();
        let _ = log.add_witnesses(id, &ws).unwrap();
        let published = log.apply_knower_threshold(5);
        assert_eq!(published, vec![id]);
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Public);
    }

    #[test]
    fn unpromoted_private_event_stays_private() {
        let mut log = EventLog::new();
        let (id, ..) = theft(&mut log);
        let _ = log.apply_knower_threshold(5);
        assert_eq!(log.get(id).unwrap().visibility, Visibility::Private);
    }
}
