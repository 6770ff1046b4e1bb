
use optimaizer_core::store::Store;
use optimaizer_core::{agent_namespace, agent_workspace_namespace, InMemoryStore};

#[tokio::test]
async fn items_are_scoped_to_their_namespace() {
    let store = InMemoryStore::new();
    let alice_notes = agent_namespace("alice", "agent-1", "notes");
    let bob_notes = agent_namespace("bob", "agent-1", "notes");

    store
        .put(&alice_notes, "n1", &serde_json::json!({"text": "alice's note"}))
        .await
        .unwrap();
    store
        .put(&bob_notes, "n1", &serde_json::json!({"text": "bob's note"}))
        .await
        .unwrap();

    let alice_item = store.get(&alice_notes, "n1").await.unwrap().unwrap();
    assert_eq!(alice_item["text"], "alice's note");

    let bob_item = store.get(&bob_notes, "n1").await.unwrap().unwrap();
    assert_eq!(bob_item["text"], "bob's note");
}

#[tokio::test]
async fn listing_a_namespace_does_not_leak_across_agents() {
    let store = InMemoryStore::new();
    let agent_one = agent_namespace("u1", "a1", "notes");
    let agent_two = agent_namespace("u1", "a2", "notes");

    store
        .put(&agent_one, "n1", &serde_json::json!({"text": "for agent one"}))
        .await
        .unwrap();
    store
        .put(&agent_two, "n1", &serde_json::json!({"text": "for agent two"}))
        .await
        .unwrap();

    let keys = store.list(&agent_one).await.unwrap();
    assert_eq!(keys, vec!["n1".to_string()]);

    let item = store.get(&agent_one, "n1").await.unwrap().unwrap();
    assert_eq!(item["text"], "for agent one");
}

#[tokio::test]
async fn deleting_an_item_removes_it_from_subsequent_lookups() {
    let store = InMemoryStore::new();
    let ns = agent_workspace_namespace("u1");

    store
        .put(&ns, "agent-1", &serde_json::json!({"alwaysOn": true}))
        .await
        .unwrap();
    assert!(store.get(&ns, "agent-1").await.unwrap().is_some());

    store.delete(&ns, "agent-1").await.unwrap();
    assert!(store.get(&ns, "agent-1").await.unwrap().is_none());
}
