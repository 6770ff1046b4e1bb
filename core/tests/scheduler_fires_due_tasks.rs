
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use optimaizer_core::scheduler::{Scheduler, TaskSink, SCHEDULES_COLLECTION};
use optimaizer_core::store::Store;
use optimaizer_core::{agent_namespace, AgentError, InMemoryStore, ScheduledTask};

struct RecordingSink {
    fired: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            fired: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskSink for RecordingSink {
    async fn fire(&self, owner_scope: &str, instruction: &str) -> Result<(), AgentError> {
        self.fired
            .lock()
            .unwrap()
            .push((owner_scope.to_string(), instruction.to_string()));
        Ok(())
    }
}

fn one_shot_due_now(id: &str, owner_scope: &str) -> ScheduledTask {
    ScheduledTask {
        id: id.to_string(),
        owner_scope: owner_scope.to_string(),
        name: "wake me up".to_string(),
        cron_expression: None,
        instruction: "remind the user to stretch".to_string(),
        enabled: true,
        timezone: "UTC".to_string(),
        one_shot: true,
        trigger_at: Some(Utc::now() - Duration::seconds(5)),
        last_run_at: None,
        last_status: None,
        created_at: Utc::now() - Duration::minutes(10),
        start_at: None,
    }
}

#[tokio::test]
async fn past_due_one_shot_trigger_fires_on_the_next_tick() {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let scheduler = Scheduler::new(store.clone(), sink.clone());

    let ns = agent_namespace("u1", "a1", SCHEDULES_COLLECTION);
    let task = one_shot_due_now("t1", "user:u1:agent:a1");
    store
        .put(&ns, &task.id, &serde_json::to_value(&task).unwrap())
        .await
        .unwrap();

    scheduler.tick(Utc::now()).await.unwrap();

    let fired = sink.fired.lock().unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, "user:u1:agent:a1");

    let stored = store.get(&ns, "t1").await.unwrap().unwrap();
    let updated: ScheduledTask = serde_json::from_value(stored).unwrap();
    assert!(!updated.enabled, "one-shot trigger disables itself after firing");
    assert!(updated.last_run_at.is_some());
}

#[tokio::test]
async fn a_one_shot_trigger_never_fires_twice() {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let scheduler = Scheduler::new(store.clone(), sink.clone());

    let ns = agent_namespace("u1", "a1", SCHEDULES_COLLECTION);
    let task = one_shot_due_now("t1", "user:u1:agent:a1");
    store
        .put(&ns, &task.id, &serde_json::to_value(&task).unwrap())
        .await
        .unwrap();

    scheduler.tick(Utc::now()).await.unwrap();
    scheduler.tick(Utc::now()).await.unwrap();

    assert_eq!(sink.fired.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn a_disabled_task_never_fires() {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let scheduler = Scheduler::new(store.clone(), sink.clone());

    let ns = agent_namespace("u1", "a1", SCHEDULES_COLLECTION);
    let mut task = one_shot_due_now("t1", "user:u1:agent:a1");
    task.enabled = false;
    store
        .put(&ns, &task.id, &serde_json::to_value(&task).unwrap())
        .await
        .unwrap();

    scheduler.tick(Utc::now()).await.unwrap();

    assert!(sink.fired.lock().unwrap().is_empty());
}
