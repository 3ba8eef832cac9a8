use parley_sessions::{MessageRole, NewMessage, SessionError, SessionStore};
use parley_stream::parse_complete;
use pretty_assertions::assert_eq;

fn store() -> SessionStore {
    SessionStore::open_in_memory().expect("in-memory store")
}

#[test]
fn default_titles_count_existing_sessions() {
    let store = store();
    assert_eq!(store.create(None).unwrap().title, "Chat 1");
    assert_eq!(store.create(Some("Named")).unwrap().title, "Named");
    assert_eq!(store.create(None).unwrap().title, "Chat 3");
}

#[test]
fn first_user_message_retitles_the_session() {
    let store = store().with_title_max_chars(10);
    let session = store.create(None).unwrap();

    store
        .add_message(&session.id, NewMessage::user("How do I reverse a list?"))
        .unwrap();
    store
        .add_message(&session.id, NewMessage::user("And a string?"))
        .unwrap();

    let session = store.get(&session.id).unwrap().unwrap();
    assert_eq!(session.title, "How do I r...");
    assert_eq!(session.messages.len(), 2);
}

#[test]
fn assistant_first_message_keeps_title() {
    let store = store();
    let session = store.create(Some("Kept")).unwrap();
    store
        .add_message(&session.id, NewMessage::assistant("hi", "hi", "", Vec::new()))
        .unwrap();
    assert_eq!(store.get(&session.id).unwrap().unwrap().title, "Kept");
}

#[test]
fn assistant_message_round_trips_parsed_channels() {
    let store = store();
    let session = store.create(None).unwrap();
    let raw = "<think>plan</think>Here:\n<CODE_ARTIFACT>\n```rust\nfn main() {}\n```\n</CODE_ARTIFACT>\nDone.";
    let parsed = parse_complete(raw);

    store
        .add_message(
            &session.id,
            NewMessage::assistant(
                raw,
                parsed.display_content.clone(),
                parsed.thinking_content.clone(),
                parsed.artifacts.clone(),
            ),
        )
        .unwrap();

    let message = &store.get(&session.id).unwrap().unwrap().messages[0];
    assert_eq!(message.role, MessageRole::Assistant);
    assert_eq!(message.content, raw);
    assert_eq!(message.display.as_deref(), Some("Here:\nDone."));
    assert_eq!(message.thinking.as_deref(), Some("plan"));
    assert_eq!(message.artifacts, parsed.artifacts);
}

#[test]
fn history_returns_latest_messages_oldest_first() {
    let store = store();
    let session = store.create(None).unwrap();
    for i in 0..5 {
        store
            .add_message(&session.id, NewMessage::user(format!("m{i}")))
            .unwrap();
    }

    let history: Vec<String> = store
        .history(&session.id, 3)
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(history, ["m2", "m3", "m4"]);
}

#[test]
fn list_is_newest_first_with_last_message() {
    let store = store();
    let older = store.create(Some("older")).unwrap();
    let newer = store.create(Some("newer")).unwrap();
    store
        .add_message(&older.id, NewMessage::assistant("<think>x</think>raw", "shown", "x", Vec::new()))
        .unwrap();

    let list = store.list().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, older.id);
    assert_eq!(list[0].last_message.as_deref(), Some("shown"));
    assert_eq!(list[0].message_count, 1);
    assert_eq!(list[1].id, newer.id);
    assert_eq!(list[1].last_message, None);
}

#[test]
fn get_or_create_reuses_or_replaces() {
    let store = store();
    let session = store.create(None).unwrap();
    assert_eq!(store.get_or_create(&session.id).unwrap().id, session.id);

    let fresh = store.get_or_create("no-such-session").unwrap();
    assert_ne!(fresh.id, "no-such-session");
    assert!(store.get(&fresh.id).unwrap().is_some());
}

#[test]
fn rename_delete_and_clear() {
    let store = store();
    let a = store.create(None).unwrap();
    let b = store.create(None).unwrap();
    store.add_message(&a.id, NewMessage::user("hello")).unwrap();

    store.rename(&a.id, "  Renamed ").unwrap();
    assert_eq!(store.get(&a.id).unwrap().unwrap().title, "Renamed");

    store.delete(&a.id).unwrap();
    assert!(store.get(&a.id).unwrap().is_none());
    assert!(matches!(store.delete(&a.id), Err(SessionError::NotFound { .. })));

    assert_eq!(store.clear().unwrap(), 1);
    assert!(store.get(&b.id).unwrap().is_none());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn missing_session_errors() {
    let store = store();
    assert!(store.get("missing").unwrap().is_none());
    assert!(matches!(
        store.add_message("missing", NewMessage::user("x")),
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        store.history("missing", 10),
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        store.rename("missing", "t"),
        Err(SessionError::NotFound { .. })
    ));
}

#[test]
fn not_found_maps_to_core_error() {
    let err: parley_core::ParleyError = SessionError::NotFound { id: "x".into() }.into();
    assert_eq!(err.code(), "SESSION_NOT_FOUND");
}
