use serde::{Deserialize, Serialize};

/// `{id, ownerScope, name, cronExpression, instruction, enabled, timezone,
/// oneShot, triggerAt?, lastRunAt?, lastStatus, createdAt}`.
///
/// Invariant: `oneShot` implies `triggerAt` is set and the task fires at most
/// once; on fire, `enabled` flips to `false` atomically with the fire attempt
/// (see [`crate::scheduler`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub owner_scope: String,
    pub name: String,
    #[serde(default)]
    pub cron_expression: Option<String>,
    pub instruction: String,
    pub enabled: bool,
    pub timezone: String,
    pub one_shot: bool,
    #[serde(default)]
    pub trigger_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub last_run_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub last_status: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Delays the first fire until `now >= startAt` (cron tasks only).
    #[serde(default)]
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ScheduledTask {
    pub fn validate(&self) -> Result<(), String> {
        if self.one_shot && self.trigger_at.is_none() {
            return Err(format!(
                "scheduled task {} is oneShot but has no triggerAt",
                self.id
            ));
        }
        if !self.one_shot && self.cron_expression.is_none() {
            return Err(format!(
                "scheduled task {} is recurring but has no cronExpression",
                self.id
            ));
        }
        Ok(())
    }
}
