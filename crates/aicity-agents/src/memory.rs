//! Per-agent private recall and shared city knowledge.
//!
//! Opaque to the core logic: only the decision facade consumes it. Recall
//! ranks stored entries by keyword overlap with the query, weighted by
//! recency, which is enough for prompt context without an external vector
//! store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use aicity_types::AgentId;

/// One remembered item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub day: u32,
    /// "personal", "observation", "news", ...
    pub kind: String,
    pub content: String,
}

/// Private memories, one collection per agent.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: BTreeMap<AgentId, Vec<MemoryItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a memory for an agent.
    pub fn remember(
        &mut self,
        agent: AgentId,
        day: u32,
        kind: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.items.entry(agent).or_default().push(MemoryItem {
            day,
            kind: kind.into(),
            content: content.into(),
        });
    }

    /// Top-k memories relevant to `query`, most relevant first.
    ///
    /// Score = keyword overlap + a small recency bonus, so recent events
    /// surface even when the query matches weakly.
    pub fn recall(&self, agent: AgentId, query: &str, k: usize, today: u32) -> Vec<String> {
        let Some(entries) = self.items.get(&agent) else {
            return Vec::new();
        };
        let needles: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_lowercase)
            .collect();

        let mut scored: Vec<(i64, &MemoryItem)> = entries
            .iter()
            .map(|item| {
                let haystack = item.content.to_lowercase();
                let overlap = needles
                    .iter()
                    .filter(|n| haystack.contains(n.as_str()))
                    .count() as i64;
                let age = i64::from(today.saturating_sub(item.day));
                let recency = (3 - age).max(0);
                (overlap * 10 + recency, item)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, item)| item.content.clone())
            .collect()
    }

    /// Delete all memories for an agent (on death).
    pub fn forget_all(&mut self, agent: AgentId) {
        self.items.remove(&agent);
    }

    /// Count of memories held for an agent.
    pub fn count(&self, agent: AgentId) -> usize {
        self.items.get(&agent).map_or(0, Vec::len)
    }
}

/// Shared, append-only city knowledge: laws, published news, civic facts.
#[derive(Debug, Clone, Default)]
pub struct CityKnowledge {
    items: Vec<MemoryItem>,
}

impl CityKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fact into shared knowledge.
    pub fn publish(&mut self, day: u32, kind: impl Into<String>, content: impl Into<String>) {
        self.items.push(MemoryItem {
            day,
            kind: kind.into(),
            content: content.into(),
        });
    }

    /// Top-k knowledge entries matching the query, newest first among ties.
    pub fn query(&self, query: &str, k: usize) -> Vec<&MemoryItem> {
        let needles: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_lowercase)
            .collect();
        let mut scored: Vec<(usize, &MemoryItem)> = self
            .items
            .iter()
            .map(|item| {
                let haystack = item.content.to_lowercase();
                let overlap = needles
                    .iter()
                    .filter(|n| haystack.contains(n.as_str()))
                    .count();
                (overlap, item)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.day.cmp(&a.1.day)));
        scored.into_iter().take(k).map(|(_, item)| item).collect()
    }

    /// Entries of a given kind, in publication order.
    pub fn of_kind(&self, kind: &str) -> Vec<&MemoryItem> {
        self.items.iter().filter(|i| i.kind == kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_prefers_keyword_overlap() {
        let mut store = MemoryStore::new();
        let a = AgentId::new();
        store.remember(a, 1, "personal", "Day 1: Steady work. Earned 120 tokens.");
        store.remember(a, 2, "observation", "Day 2: Saw someone lurking near the market.");
        let hits = store.recall(a, "suspicious figure near the market", 1, 2);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("market"));
    }

    #[test]
    fn recall_falls_back_to_recency() {
        let mut store = MemoryStore::new();
        let a = AgentId::new();
        store.remember(a, 1, "personal", "old entry");
        store.remember(a, 9, "personal", "fresh entry");
        let hits = store.recall(a, "zzz", 1, 9);
        assert_eq!(hits, vec![String::from("fresh entry")]);
    }

    #[test]
    fn forget_all_erases_the_agent() {
        let mut store = MemoryStore::new();
        let a = AgentId::new();
        store.remember(a, 1, "personal", "something");
        store.forget_all(a);
        assert_eq!(store.count(a), 0);
    }

    #[test]
    fn city_knowledge_filters_by_kind() {
        let mut city = CityKnowledge::new();
        city.publish(0, "law", "Law I: No agent may harm city infrastructure intentionally.");
        city.publish(1, "news", "A quiet first day.");
        assert_eq!(city.of_kind("law").len(), 1);
        assert_eq!(city.of_kind("news").len(), 1);
    }
}
