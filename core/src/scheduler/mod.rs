//! Scheduler (spec.md §4.3): cron tasks, one-shot triggers, event
//! subscriptions and location reminders all live as rows in the keyed
//! [`crate::store::Store`] under each agent's `schedules` / `subscriptions`
//! / `locationReminders` collections; this module is the tick loop that
//! turns "due" rows into a call to [`TaskSink::fire`] and writes back the
//! updated `lastRunAt`/`enabled`/`fireCount` bookkeeping.
//!
//! Deliberately store-driven rather than held in an in-process priority
//! queue: a restart just resumes ticking over the same rows, with no
//! separate persistence path to keep in sync (grounded on the same
//! poll-over-the-store shape the teacher's own background jobs use rather
//! than an in-memory timer wheel).

pub mod cron;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{EventSubscription, LocationReminder, ScheduledTask, SubscriptionType};
use crate::error::AgentError;
use crate::store::{ListNamespacesOptions, Namespace, SearchOptions, Store};

pub const SCHEDULES_COLLECTION: &str = "schedules";
pub const SUBSCRIPTIONS_COLLECTION: &str = "subscriptions";
pub const LOCATION_REMINDERS_COLLECTION: &str = "locationReminders";

/// Default interval between scheduler ticks (spec.md §5 "scheduler poll
/// interval 30 s").
pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Hands a due task's or subscription's instruction back to the owning
/// agent. Implemented by whatever embeds the engine (spec.md §4.1's runtime
/// manager composes one per deployed agent) — the scheduler itself has no
/// opinion on how the instruction reaches the conversation turn loop.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn fire(&self, owner_scope: &str, instruction: &str) -> Result<(), AgentError>;
}

fn store_err(e: crate::store::StoreError) -> AgentError {
    AgentError::ExternalError(e.to_string())
}

/// Polls the store for due scheduled tasks and subscriptions and fires them
/// through a [`TaskSink`].
pub struct Scheduler {
    store: Arc<dyn Store>,
    sink: Arc<dyn TaskSink>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn TaskSink>) -> Self {
        Self { store, sink }
    }

    /// Runs the tick loop on `interval` until `cancel` fires. One failing
    /// tick is logged and does not stop the loop (spec.md §4.3 "a failing
    /// fire must not prevent the next tick").
    pub async fn run(&self, interval: StdDuration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(chrono::Utc::now()).await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One polling pass over every agent's scheduled tasks and poll-type
    /// subscriptions.
    pub async fn tick(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), AgentError> {
        self.tick_scheduled_tasks(now).await?;
        self.tick_poll_subscriptions(now).await?;
        Ok(())
    }

    async fn namespaces_for(&self, collection: &str) -> Result<Vec<Namespace>, AgentError> {
        let options = ListNamespacesOptions::new().with_suffix(vec![collection.to_string()]);
        self.store.list_namespaces(options).await.map_err(store_err)
    }

    async fn all_items(&self, namespace: &Namespace) -> Result<Vec<(String, serde_json::Value)>, AgentError> {
        let results = self
            .store
            .search(namespace, SearchOptions { query: None, filter: None, limit: usize::MAX, offset: 0 })
            .await
            .map_err(store_err)?;
        Ok(results
            .into_iter()
            .map(|si| (si.item.key, si.item.value))
            .collect())
    }

    async fn tick_scheduled_tasks(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), AgentError> {
        // Due tasks are collected across every agent's namespace first and
        // fired in a single `createdAt`-ascending pass (spec.md §4.3 "when
        // multiple tasks match the same tick, fire order is by `createdAt`
        // ascending", §5 "deterministic by `createdAt`") rather than in
        // whatever order the store happens to iterate namespaces and keys.
        let mut due: Vec<(Namespace, String, ScheduledTask)> = Vec::new();
        for namespace in self.namespaces_for(SCHEDULES_COLLECTION).await? {
            for (key, raw) in self.all_items(&namespace).await? {
                let Ok(task) = serde_json::from_value::<ScheduledTask>(raw) else {
                    continue;
                };
                if !task.enabled || !is_task_due(&task, now) {
                    continue;
                }
                due.push((namespace.clone(), key, task));
            }
        }
        due.sort_by_key(|(_, _, task)| task.created_at);

        for (namespace, key, mut task) in due {
            if task.one_shot {
                task.enabled = false;
            }
            task.last_run_at = Some(now);

            task.last_status = match self.sink.fire(&task.owner_scope, &task.instruction).await {
                Ok(()) => Some("fired".to_string()),
                Err(e) => {
                    warn!(error = %e, task = %task.id, "scheduled task fire failed");
                    Some(format!("error: {e}"))
                }
            };

            let value = serde_json::to_value(&task).map_err(|e| AgentError::Internal(e.to_string()))?;
            self.store.put(&namespace, &key, &value).await.map_err(store_err)?;
        }
        Ok(())
    }

    async fn tick_poll_subscriptions(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), AgentError> {
        for namespace in self.namespaces_for(SUBSCRIPTIONS_COLLECTION).await? {
            for (key, raw) in self.all_items(&namespace).await? {
                let Ok(mut sub) = serde_json::from_value::<EventSubscription>(raw) else {
                    continue;
                };
                if sub.kind != SubscriptionType::Poll || !is_subscription_due(&sub, now) {
                    continue;
                }

                sub.record_fire(now);
                if let Err(e) = self.sink.fire(&sub.owner_scope, &sub.instruction).await {
                    warn!(error = %e, subscription = %sub.id, "subscription fire failed");
                }

                let value = serde_json::to_value(&sub).map_err(|e| AgentError::Internal(e.to_string()))?;
                self.store.put(&namespace, &key, &value).await.map_err(store_err)?;
            }
        }
        Ok(())
    }
}

/// Whether `task` is due at `now`: one-shot tasks fire once their
/// `triggerAt` has passed (including ones whose instant was already in the
/// past when first observed — the scheduler fires them on its very next
/// tick rather than silently dropping them); recurring tasks fire once the
/// cron schedule's next occurrence after their last run (or creation, if
/// never run) has passed, gated by an optional `startAt` delay.
fn is_task_due(task: &ScheduledTask, now: chrono::DateTime<chrono::Utc>) -> bool {
    if let Some(start_at) = task.start_at {
        if now < start_at {
            return false;
        }
    }

    if task.one_shot {
        return task.trigger_at.map(|t| now >= t).unwrap_or(false);
    }

    let Some(expr) = &task.cron_expression else {
        return false;
    };
    let since = task.last_run_at.unwrap_or(task.created_at);
    matches!(cron::next_fire_after(expr, &task.timezone, since), Ok(next) if next <= now)
}

fn is_subscription_due(sub: &EventSubscription, now: chrono::DateTime<chrono::Utc>) -> bool {
    if !sub.can_fire(now) {
        return false;
    }
    match sub.poll_interval_minutes {
        Some(minutes) => sub
            .last_fired_at
            .map(|last| now - last >= chrono::Duration::minutes(minutes))
            .unwrap_or(true),
        None => true,
    }
}

impl Scheduler {
    /// Reactive fire path for `keyword`-type subscriptions (spec.md §4.3:
    /// "`keyword` ... fired reactively by other components; the scheduler
    /// gates on `cooldownMinutes`"). Scans every keyword subscription for
    /// `(user_id, agent_id)` whose `pattern` is found (case-insensitive) in
    /// `text`; each match still due (cooldown elapsed) is fired and its
    /// `lastFiredAt`/`fireCount` persisted. Returns the instructions that
    /// were actually fired, in subscription order, so the caller can tell
    /// whether anything happened without re-deriving the match itself.
    pub async fn fire_keyword_matches(
        &self,
        user_id: &str,
        agent_id: &str,
        text: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>, AgentError> {
        let namespace = crate::store::agent_namespace(user_id, agent_id, SUBSCRIPTIONS_COLLECTION);
        let mut fired = Vec::new();
        let lower_text = text.to_lowercase();

        for (key, raw) in self.all_items(&namespace).await? {
            let Ok(mut sub) = serde_json::from_value::<EventSubscription>(raw) else {
                continue;
            };
            if sub.kind != SubscriptionType::Keyword || !sub.can_fire(now) {
                continue;
            }
            if sub.pattern.is_empty() || !lower_text.contains(&sub.pattern.to_lowercase()) {
                continue;
            }

            sub.record_fire(now);
            if let Err(e) = self.sink.fire(&sub.owner_scope, &sub.instruction).await {
                warn!(error = %e, subscription = %sub.id, "keyword subscription fire failed");
                continue;
            }
            fired.push(sub.instruction.clone());

            let value = serde_json::to_value(&sub).map_err(|e| AgentError::Internal(e.to_string()))?;
            self.store.put(&namespace, &key, &value).await.map_err(store_err)?;
        }

        Ok(fired)
    }

    /// Reactive fire path for subscriptions driven by an external stimulus
    /// the scheduler itself never polls for: `webhook`, `ha_state`, and
    /// `custom` (spec.md §4.3). The caller (whatever embeds a webhook
    /// endpoint or a home-automation state listener — both out of scope per
    /// spec.md §1) identifies which subscription fired by id; this method
    /// only applies the cooldown gate and the fire/persist bookkeeping
    /// common to every subscription kind. Returns `Ok(false)` if the
    /// subscription is disabled, still in cooldown, or is a `poll`-type
    /// subscription (which only the tick loop may fire).
    pub async fn fire_external(
        &self,
        user_id: &str,
        agent_id: &str,
        subscription_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, AgentError> {
        let namespace = crate::store::agent_namespace(user_id, agent_id, SUBSCRIPTIONS_COLLECTION);
        let raw = self
            .store
            .get(&namespace, subscription_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| AgentError::NotFound(format!("subscription {subscription_id}")))?;
        let mut sub: EventSubscription = serde_json::from_value(raw)
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        if sub.kind == SubscriptionType::Poll || !sub.can_fire(now) {
            return Ok(false);
        }

        sub.record_fire(now);
        self.sink.fire(&sub.owner_scope, &sub.instruction).await?;

        let value = serde_json::to_value(&sub).map_err(|e| AgentError::Internal(e.to_string()))?;
        self.store.put(&namespace, subscription_id, &value).await.map_err(store_err)?;
        Ok(true)
    }
}

/// Pure helper for inbound location updates (spec.md §4.3): the subset of
/// `reminders` that should fire for `(lat, lon)` at `now`. Proximity
/// detection stays a pure function here so the engine (which owns the
/// inbound-location stimulus) can call it without needing a `Scheduler`
/// instance or store access of its own.
pub fn due_location_reminders<'a>(
    reminders: &'a [LocationReminder],
    lat: f64,
    lon: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<&'a LocationReminder> {
    reminders.iter().filter(|r| r.should_fire(lat, lon, now)).collect()
}
