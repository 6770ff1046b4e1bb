use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Webhook,
    Poll,
    Keyword,
    HaState,
    Custom,
}

/// `{id, name, type, pattern, instruction, cooldownMinutes, pollIntervalMinutes?,
/// lastFiredAt, fireCount, enabled}`.
///
/// Invariant: a subscription fires only if `now − lastFiredAt ≥ cooldown`
/// (spec.md §3). `poll`-type subscriptions are additionally gated by the
/// scheduler's tick against `pollIntervalMinutes`; the other types fire
/// reactively from an external stimulus and are gated on cooldown alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: String,
    pub owner_scope: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
    pub pattern: String,
    pub instruction: String,
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub poll_interval_minutes: Option<i64>,
    #[serde(default)]
    pub last_fired_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub fire_count: u64,
    pub enabled: bool,
}

impl EventSubscription {
    /// Cooldown gate shared by every subscription kind. Uses a monotonic
    /// duration comparison over wall-clock timestamps; the scheduler itself
    /// uses a monotonic clock for the interval arithmetic driving the poll
    /// tick (spec.md §9 "Scheduler clock source").
    pub fn cooldown_elapsed(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self.last_fired_at {
            None => true,
            Some(last) => now - last >= chrono::Duration::minutes(self.cooldown_minutes),
        }
    }

    pub fn can_fire(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.enabled && self.cooldown_elapsed(now)
    }

    pub fn record_fire(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.last_fired_at = Some(now);
        self.fire_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EventSubscription {
        EventSubscription {
            id: "s1".into(),
            owner_scope: "user:u1:agent:a1".into(),
            name: "price-drop".into(),
            kind: SubscriptionType::Poll,
            pattern: "".into(),
            instruction: "notify".into(),
            cooldown_minutes: 60,
            poll_interval_minutes: Some(15),
            last_fired_at: None,
            fire_count: 0,
            enabled: true,
        }
    }

    #[test]
    fn fires_once_then_honors_cooldown() {
        let mut s = base();
        let now = chrono::Utc::now();
        assert!(s.can_fire(now));
        s.record_fire(now);
        assert_eq!(s.fire_count, 1);
        assert!(!s.can_fire(now + chrono::Duration::minutes(30)));
        assert!(s.can_fire(now + chrono::Duration::minutes(61)));
    }
}
