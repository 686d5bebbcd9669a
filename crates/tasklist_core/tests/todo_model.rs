use tasklist_core::{Entity, FilterStatus, Todo, TodoDraft};

#[test]
fn from_draft_sets_defaults() {
    let todo = Todo::from_draft("id-1".to_string(), TodoDraft::new("hello"));

    assert_eq!(todo.id(), "id-1");
    assert_eq!(todo.title, "hello");
    assert!(!todo.completed);
    assert_eq!(todo.due_date, None);
}

#[test]
fn serialization_uses_expected_wire_fields() {
    let todo = Todo::from_draft(
        "11111111-2222-4333-8444-555555555555".to_string(),
        TodoDraft::new("ship it").with_due_date("2026-10-31"),
    );

    let json = serde_json::to_value(&todo).unwrap();
    assert_eq!(json["id"], "11111111-2222-4333-8444-555555555555");
    assert_eq!(json["title"], "ship it");
    assert_eq!(json["completed"], false);
    assert_eq!(json["dueDate"], "2026-10-31");

    let decoded: Todo = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, todo);
}

#[test]
fn absent_due_date_is_omitted() {
    let todo = Todo::from_draft("a".to_string(), TodoDraft::new("plain"));
    let json = serde_json::to_value(&todo).unwrap();
    assert!(json.get("dueDate").is_none());
}

#[test]
fn deserialize_requires_completed_flag() {
    let value = serde_json::json!({ "id": "a", "title": "no flag" });
    assert!(serde_json::from_value::<Todo>(value).is_err());
}

#[test]
fn filter_status_uses_lowercase_names() {
    assert_eq!(
        serde_json::to_value(FilterStatus::Pending).unwrap(),
        "pending"
    );
    let parsed: FilterStatus = serde_json::from_value(serde_json::json!("completed")).unwrap();
    assert_eq!(parsed, FilterStatus::Completed);
    assert_eq!(FilterStatus::All.to_string(), "all");
}
