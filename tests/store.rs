//! Message store tests, run against both backends

use std::sync::Arc;
use std::thread;

use parlor::{
    page, ChatError, Clock, LmdbMessageStore, ManualClock, MemoryMessageStore, MessageRequest,
    MessageStore, StoredMessage, SystemClock, PAGE_SIZE,
};
use tempfile::TempDir;

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(1_000, 1))
}

fn frozen() -> Arc<dyn Clock> {
    Arc::new(ManualClock::frozen(5))
}

fn memory() -> MemoryMessageStore {
    MemoryMessageStore::new(clock())
}

fn lmdb() -> (TempDir, LmdbMessageStore) {
    lmdb_with(clock())
}

fn lmdb_with(clock: Arc<dyn Clock>) -> (TempDir, LmdbMessageStore) {
    let dir = TempDir::new().unwrap();
    let store = LmdbMessageStore::open(dir.path().join("parlor.mdb"), clock).unwrap();
    (dir, store)
}

// ============================================================================
// Shared behaviour
// ============================================================================

fn check_create_assigns_id(store: &dyn MessageStore) {
    let m = store.create(MessageRequest::new("username", "text")).unwrap();
    assert_eq!(m.id.len(), parlor::store::ID_LEN);
    assert!(m.id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(m.username, "username");
    assert_eq!(m.text.as_deref(), Some("text"));
    assert_eq!(m.image_url, None);
    assert_eq!(store.get(&m.id).unwrap(), Some(m));
}

fn check_create_keeps_image(store: &dyn MessageStore) {
    let req = MessageRequest {
        username: "u".into(),
        text: None,
        image_url: Some("https://img.example/cat.png".into()),
    };
    let m = store.create(req).unwrap();
    assert_eq!(m.image_url.as_deref(), Some("https://img.example/cat.png"));
    assert_eq!(m.text, None);
}

fn check_ids_unique(store: &dyn MessageStore) {
    let mut ids: Vec<String> = (0..100)
        .map(|i| store.create(MessageRequest::new("u", format!("t{}", i))).unwrap().id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 100);
    assert_eq!(store.len().unwrap(), 100);
}

fn check_list_in_creation_order(store: &dyn MessageStore) {
    for i in 0..10 {
        store.create(MessageRequest::new("u", format!("t{}", i))).unwrap();
    }
    let texts: Vec<String> = store
        .list_ordered()
        .unwrap()
        .into_iter()
        .map(|m| m.text.unwrap())
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
    assert_eq!(texts, expected);
}

fn check_same_millisecond_keeps_creation_order(store: &dyn MessageStore) {
    let created: Vec<String> = (0..200)
        .map(|i| store.create(MessageRequest::new("u", format!("t{}", i))).unwrap().id)
        .collect();
    let listed = store.list_ordered().unwrap();
    let ids: Vec<String> = listed.iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids, created);
    assert!(listed.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

fn check_cursor_sees_later_messages(store: &dyn MessageStore) {
    let cursor = store.create(MessageRequest::new("u", "first")).unwrap();
    let later: Vec<String> = (0..PAGE_SIZE)
        .map(|i| store.create(MessageRequest::new("u", format!("t{}", i))).unwrap().id)
        .collect();
    let p = page(store.list_ordered().unwrap(), Some(cursor.id.as_str()), PAGE_SIZE).unwrap();
    let ids: Vec<String> = p.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, later);
}

fn check_create_after_seeded_future(store: &dyn MessageStore) {
    store.insert("seed", StoredMessage::new("u", 10_000, "seeded")).unwrap();
    let m = store.create(MessageRequest::new("u", "new")).unwrap();
    assert_eq!(m.timestamp, 10_001);
    let last = store.list_ordered().unwrap().pop().unwrap();
    assert_eq!(last.id, m.id);
}

fn check_concurrent_creates_keep_per_writer_order(store: Arc<dyn MessageStore>) {
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|i| store.create(MessageRequest::new("u", format!("{}-{}", t, i))).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let per_writer: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let listed = store.list_ordered().unwrap();
    assert_eq!(listed.len(), 200);
    assert!(listed.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    for ids in per_writer {
        let positions: Vec<usize> =
            ids.iter().map(|id| listed.iter().position(|m| &m.id == id).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}

fn check_blank_text_not_stored(store: &dyn MessageStore) {
    let req = MessageRequest {
        username: "u".into(),
        text: Some("  ".into()),
        image_url: Some("https://img.example/cat.png".into()),
    };
    let m = store.create(req).unwrap();
    assert_eq!(m.text, None);
    assert_eq!(store.get(&m.id).unwrap().unwrap().text, None);
}

fn check_ties_broken_by_id(store: &dyn MessageStore) {
    store.insert("b", StoredMessage::new("u", 5, "second")).unwrap();
    store.insert("a", StoredMessage::new("u", 5, "first")).unwrap();
    store.insert("c", StoredMessage::new("u", 1, "oldest")).unwrap();
    let ids: Vec<String> = store.list_ordered().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

fn check_insert_conflict(store: &dyn MessageStore) {
    store.insert("1", StoredMessage::new("u1", 1, "t1")).unwrap();
    let r = store.insert("1", StoredMessage::new("u2", 2, "t2"));
    assert_eq!(r, Err(ChatError::Conflict("1".into())));
    assert_eq!(store.get("1").unwrap().unwrap().username, "u1");
    assert_eq!(store.len().unwrap(), 1);
}

fn check_get_missing(store: &dyn MessageStore) {
    assert_eq!(store.get("nope").unwrap(), None);
}

fn check_clear(store: &dyn MessageStore) {
    store.insert("1", StoredMessage::new("u1", 1, "t1")).unwrap();
    store.create(MessageRequest::new("u", "t")).unwrap();
    store.clear().unwrap();
    assert!(store.is_empty().unwrap());
    assert!(store.list_ordered().unwrap().is_empty());
    assert_eq!(store.get("1").unwrap(), None);
}

// ============================================================================
// Memory
// ============================================================================

mod memory_store {
    use super::*;

    #[test] fn create_assigns_id() { check_create_assigns_id(&memory()); }
    #[test] fn create_keeps_image() { check_create_keeps_image(&memory()); }
    #[test] fn ids_unique() { check_ids_unique(&memory()); }
    #[test] fn list_in_creation_order() { check_list_in_creation_order(&memory()); }
    #[test] fn ties_broken_by_id() { check_ties_broken_by_id(&memory()); }
    #[test] fn insert_conflict() { check_insert_conflict(&memory()); }
    #[test] fn get_missing() { check_get_missing(&memory()); }
    #[test] fn clear() { check_clear(&memory()); }
    #[test] fn blank_text_not_stored() { check_blank_text_not_stored(&memory()); }
    #[test] fn create_after_seeded_future() { check_create_after_seeded_future(&MemoryMessageStore::new(frozen())); }

    #[test]
    fn frozen_clock_keeps_creation_order() {
        check_same_millisecond_keeps_creation_order(&MemoryMessageStore::new(frozen()));
    }

    #[test]
    fn system_clock_keeps_creation_order() {
        check_same_millisecond_keeps_creation_order(&MemoryMessageStore::new(Arc::new(SystemClock)));
    }

    #[test]
    fn cursor_sees_later_messages() {
        check_cursor_sees_later_messages(&MemoryMessageStore::new(frozen()));
    }

    #[test]
    fn concurrent_creates_keep_per_writer_order() {
        check_concurrent_creates_keep_per_writer_order(Arc::new(MemoryMessageStore::new(frozen())));
    }

    #[test]
    fn concurrent_creates_are_distinct() {
        let store = Arc::new(memory());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|i| store.create(MessageRequest::new("u", format!("{}-{}", t, i))).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<String> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(store.list_ordered().unwrap().len(), 200);
    }
}

// ============================================================================
// LMDB
// ============================================================================

mod lmdb_store {
    use super::*;

    #[test] fn create_assigns_id() { let (_d, s) = lmdb(); check_create_assigns_id(&s); }
    #[test] fn create_keeps_image() { let (_d, s) = lmdb(); check_create_keeps_image(&s); }
    #[test] fn ids_unique() { let (_d, s) = lmdb(); check_ids_unique(&s); }
    #[test] fn list_in_creation_order() { let (_d, s) = lmdb(); check_list_in_creation_order(&s); }
    #[test] fn ties_broken_by_id() { let (_d, s) = lmdb(); check_ties_broken_by_id(&s); }
    #[test] fn insert_conflict() { let (_d, s) = lmdb(); check_insert_conflict(&s); }
    #[test] fn get_missing() { let (_d, s) = lmdb(); check_get_missing(&s); }
    #[test] fn clear() { let (_d, s) = lmdb(); check_clear(&s); }
    #[test] fn blank_text_not_stored() { let (_d, s) = lmdb(); check_blank_text_not_stored(&s); }
    #[test] fn create_after_seeded_future() { let (_d, s) = lmdb_with(frozen()); check_create_after_seeded_future(&s); }

    #[test]
    fn frozen_clock_keeps_creation_order() {
        let (_d, s) = lmdb_with(frozen());
        check_same_millisecond_keeps_creation_order(&s);
    }

    #[test]
    fn system_clock_keeps_creation_order() {
        let (_d, s) = lmdb_with(Arc::new(SystemClock));
        check_same_millisecond_keeps_creation_order(&s);
    }

    #[test]
    fn cursor_sees_later_messages() {
        let (_d, s) = lmdb_with(frozen());
        check_cursor_sees_later_messages(&s);
    }

    #[test]
    fn concurrent_creates_keep_per_writer_order() {
        let (_d, s) = lmdb_with(frozen());
        check_concurrent_creates_keep_per_writer_order(Arc::new(s));
    }

    #[test]
    fn timestamps_stay_monotonic_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parlor.mdb");
        let first = {
            let store = LmdbMessageStore::open(&path, frozen()).unwrap();
            store.create(MessageRequest::new("u", "a")).unwrap();
            store.create(MessageRequest::new("u", "b")).unwrap()
        };
        let store = LmdbMessageStore::open(&path, frozen()).unwrap();
        let next = store.create(MessageRequest::new("u", "c")).unwrap();
        assert!(next.timestamp > first.timestamp);
        assert_eq!(store.list_ordered().unwrap().pop().unwrap().id, next.id);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parlor.mdb");
        let id = {
            let store = LmdbMessageStore::open(&path, clock()).unwrap();
            store.insert("1", StoredMessage::new("u1", 1, "t1")).unwrap();
            let m = store.create(MessageRequest::new("u2", "t2")).unwrap();
            store.flush().unwrap();
            m.id
        };

        let store = LmdbMessageStore::open(&path, clock()).unwrap();
        let listed = store.list_ordered().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "1");
        assert_eq!(listed[1].id, id);
        assert_eq!(listed[1].text.as_deref(), Some("t2"));
    }

    #[test]
    fn timestamps_order_numerically() {
        let (_d, s) = lmdb();
        // "1000" < "999" as decimal strings, but not as big-endian bytes
        s.insert("x", StoredMessage::new("u", 1000, "later")).unwrap();
        s.insert("y", StoredMessage::new("u", 999, "earlier")).unwrap();
        let ids: Vec<String> = s.list_ordered().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["y", "x"]);
    }
}
