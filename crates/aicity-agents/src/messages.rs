//! The per-agent inbox with bounded retention.
//!
//! Messages expire after a TTL measured in days. `from: None` is the
//! anonymous sender sentinel (a robbed victim is told "you've been robbed"
//! without learning by whom).

use chrono::Utc;

use aicity_types::{AgentId, EventId, Message, MessageId};

/// In-process message bus with TTL-based expiry.
#[derive(Debug, Clone)]
pub struct MessageBus {
    messages: Vec<Message>,
    /// Messages older than this many days are dropped.
    ttl_days: u32,
}

impl MessageBus {
    pub fn new(ttl_days: u32) -> Self {
        Self {
            messages: Vec::new(),
            ttl_days,
        }
    }

    /// Rebuild from persisted messages.
    pub fn from_messages(ttl_days: u32, messages: Vec<Message>) -> Self {
        Self { messages, ttl_days }
    }

    /// Send a message. Returns its id.
    pub fn send(
        &mut self,
        day: u32,
        from: Option<AgentId>,
        to: AgentId,
        body: impl Into<String>,
    ) -> MessageId {
        self.send_about(day, from, to, body, None)
    }

    /// Send a message that references an event (gossip). The reference is
    /// what lets the event log promote the event to rumor.
    pub fn send_about(
        &mut self,
        day: u32,
        from: Option<AgentId>,
        to: AgentId,
        body: impl Into<String>,
        about_event: Option<EventId>,
    ) -> MessageId {
        let message = Message {
            id: MessageId::new(),
            day,
            from,
            to,
            body: body.into(),
            sent_at: Utc::now(),
            read_at: None,
            about_event,
        };
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// The agent's unexpired inbox, oldest first, marking messages read.
    pub fn inbox(&mut self, agent: AgentId, today: u32) -> Vec<Message> {
        let cutoff = today.saturating_sub(self.ttl_days);
        let now = Utc::now();
        self.messages
            .iter_mut()
            .filter(|m| m.to == agent && m.day >= cutoff)
            .map(|m| {
                if m.read_at.is_none() {
                    m.read_at = Some(now);
                }
                m.clone()
            })
            .collect()
    }

    /// Peek at an agent's unexpired inbox without marking anything read.
    pub fn peek(&self, agent: AgentId, today: u32) -> Vec<&Message> {
        let cutoff = today.saturating_sub(self.ttl_days);
        self.messages
            .iter()
            .filter(|m| m.to == agent && m.day >= cutoff)
            .collect()
    }

    /// Messages exchanged between two agents within the TTL window, in
    /// either direction. Used by the meeting matcher and gang recruitment.
    pub fn between(&self, a: AgentId, b: AgentId, today: u32) -> Vec<&Message> {
        let cutoff = today.saturating_sub(self.ttl_days);
        self.messages
            .iter()
            .filter(|m| m.day >= cutoff)
            .filter(|m| {
                (m.from == Some(a) && m.to == b) || (m.from == Some(b) && m.to == a)
            })
            .collect()
    }

    /// Distinct agents `sender` has messaged within the TTL window.
    pub fn contacts_of(&self, sender: AgentId, today: u32) -> Vec<AgentId> {
        let cutoff = today.saturating_sub(self.ttl_days);
        let mut out: Vec<AgentId> = self
            .messages
            .iter()
            .filter(|m| m.from == Some(sender) && m.day >= cutoff)
            .map(|m| m.to)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Messages sent on `day`, for the persistence delta.
    pub fn sent_on(&self, day: u32) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.day == day).collect()
    }

    /// Drop expired messages; the scheduler calls this once per day.
    pub fn expire(&mut self, today: u32) {
        let cutoff = today.saturating_sub(self.ttl_days);
        self.messages.retain(|m| m.day >= cutoff);
    }

    /// Remove everything addressed to an agent (on death).
    pub fn clear_inbox(&mut self, agent: AgentId) {
        self.messages.retain(|m| m.to != agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_marks_read_and_filters_recipient() {
        let mut bus = MessageBus::new(3);
        let a = AgentId::new();
        let b = AgentId::new();
        bus.send(1, Some(a), b, "hello");
        bus.send(1, Some(b), a, "hi back");

        let inbox = bus.inbox(b, 1);
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].read_at.is_some());
        assert_eq!(inbox[0].body, "hello");
    }

    #[test]
    fn messages_expire_after_ttl() {
        let mut bus = MessageBus::new(3);
        let a = AgentId::new();
        let b = AgentId::new();
        bus.send(1, Some(a), b, "old news");
        bus.expire(5);
        assert!(bus.peek(b, 5).is_empty());
    }

    #[test]
    fn anonymous_sender_is_preserved() {
        let mut bus = MessageBus::new(3);
        let victim = AgentId::new();
        bus.send(2, None, victim, "You've been robbed. Check your tokens.");
        let inbox = bus.inbox(victim, 2);
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].from.is_none());
    }

    #[test]
    fn contacts_deduplicate() {
        let mut bus = MessageBus::new(3);
        let leader = AgentId::new();
        let recruit = AgentId::new();
        bus.send(1, Some(leader), recruit, "join me");
        bus.send(2, Some(leader), recruit, "think it over");
        assert_eq!(bus.contacts_of(leader, 2), vec![recruit]);
    }

    #[test]
    fn clear_inbox_removes_only_that_agent() {
        let mut bus = MessageBus::new(3);
        let a = AgentId::new();
        let b = AgentId::new();
        bus.send(1, Some(a), b, "to b");
        bus.send(1, Some(b), a, "to a");
        bus.clear_inbox(b);
        assert!(bus.peek(b, 1).is_empty());
        assert_eq!(bus.peek(a, 1).len(), 1);
    }
}
