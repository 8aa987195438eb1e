//! Per-agent mood: a scalar in [-1, +1] with documented triggers.
//!
//! Mood accumulates signed deltas during the day and is clamped at the
//! boundaries. It is an input to the decision facade as descriptive text --
//! the reasoning model never sees the number.

use rust_decimal::Decimal;

/// Documented mood triggers and their deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodTrigger {
    /// Victim of theft.
    TheftVictim,
    /// A standing asset was destroyed (applies to every alive non-actor).
    AssetDestroyed,
    /// The agent's reported case went cold (per day of inaction).
    CaseWentCold,
    /// Received a welfare grant.
    WelfareReceived,
    /// Healed by a healer.
    Healed,
    /// Guilty verdict in a case the agent reported.
    JusticeServed,
    /// Daily earnings above the configured threshold.
    StrongEarnings,
    /// Balance below the survival floor at end of day.
    DailyStress,
}

impl MoodTrigger {
    /// The signed delta for this trigger.
    pub fn delta(self) -> Decimal {
        match self {
            Self::TheftVictim => Decimal::new(-20, 2),
            Self::AssetDestroyed => Decimal::new(-30, 2),
            Self::CaseWentCold => Decimal::new(-15, 2),
            Self::WelfareReceived => Decimal::new(10, 2),
            Self::Healed => Decimal::new(15, 2),
            Self::JusticeServed => Decimal::new(20, 2),
            Self::StrongEarnings => Decimal::new(5, 2),
            Self::DailyStress => Decimal::new(-10, 2),
        }
    }
}

/// Apply a trigger to a mood score, clamping to [-1, +1].
pub fn apply(mood: Decimal, trigger: MoodTrigger) -> Decimal {
    clamp(mood + trigger.delta())
}

/// Clamp a mood score to [-1, +1].
pub fn clamp(mood: Decimal) -> Decimal {
    mood.clamp(Decimal::new(-1, 0), Decimal::new(1, 0))
}

/// Descriptive label for a mood score. This is what the reasoning model and
/// observers see.
pub fn describe(mood: Decimal) -> &'static str {
    if mood >= Decimal::new(60, 2) {
        "thriving"
    } else if mood >= Decimal::new(25, 2) {
        "content"
    } else if mood >= Decimal::new(-10, 2) {
        "steady"
    } else if mood >= Decimal::new(-40, 2) {
        "uneasy"
    } else if mood >= Decimal::new(-70, 2) {
        "desperate"
    } else {
        "broken"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_match_the_documented_table() {
        assert_eq!(MoodTrigger::TheftVictim.delta(), Decimal::new(-20, 2));
        assert_eq!(MoodTrigger::AssetDestroyed.delta(), Decimal::new(-30, 2));
        assert_eq!(MoodTrigger::CaseWentCold.delta(), Decimal::new(-15, 2));
        assert_eq!(MoodTrigger::WelfareReceived.delta(), Decimal::new(10, 2));
        assert_eq!(MoodTrigger::Healed.delta(), Decimal::new(15, 2));
        assert_eq!(MoodTrigger::JusticeServed.delta(), Decimal::new(20, 2));
        assert_eq!(MoodTrigger::StrongEarnings.delta(), Decimal::new(5, 2));
        assert_eq!(MoodTrigger::DailyStress.delta(), Decimal::new(-10, 2));
    }

    #[test]
    fn mood_clamps_at_the_floor() {
        let mut mood = Decimal::new(-90, 2);
        mood = apply(mood, MoodTrigger::AssetDestroyed);
        assert_eq!(mood, Decimal::new(-1, 0));
    }

    #[test]
    fn mood_clamps_at_the_ceiling() {
        let mut mood = Decimal::new(95, 2);
        mood = apply(mood, MoodTrigger::JusticeServed);
        assert_eq!(mood, Decimal::new(1, 0));
    }

    #[test]
    fn labels_cover_the_range() {
        assert_eq!(describe(Decimal::new(80, 2)), "thriving");
        assert_eq!(describe(Decimal::ZERO), "steady");
        assert_eq!(describe(Decimal::new(-50, 2)), "desperate");
        assert_eq!(describe(Decimal::new(-85, 2)), "broken");
    }
}
