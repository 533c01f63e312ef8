use scriptorium_continuity::{
    Book, BookHeader, BookStatus, Chapter, Character, CharacterStatus, CharacterUpdate,
    ContinuityStore, EmotionalBeat, Manuscript, PlotThread, ThreadStatus, TimelineEntry,
};
use scriptorium_error::ContinuityErrorKind;

fn harbor_store() -> ContinuityStore {
    let mut store = ContinuityStore::new("A lighthouse keeper hears a drowned bell.");
    store.add_transition("Harbor", "Market", 1);
    store.add_transition("Market", "Tower", 2);
    store.record_character(Character::named("Mara"));
    store.place_character("Mara", "Harbor").unwrap();
    store
}

#[test]
fn test_harbor_to_tower_requires_cumulative_time() {
    let store = harbor_store();
    assert!(!store.validate_movement("Mara", "Tower", 1));
    assert!(store.validate_movement("Mara", "Tower", 3));
    assert!(store.validate_movement("Mara", "Market", 1));
    assert!(!store.validate_movement("Mara", "Nowhere", 10));
    assert_eq!(store.find_path("Harbor", "Tower"), vec!["Harbor", "Market", "Tower"]);
    assert!(store.find_path("Tower", "Harbor").is_empty());
}

#[test]
fn test_empty_graph_permits_any_move() {
    let mut store = ContinuityStore::new("premise");
    store.record_character(Character::named("Oren"));
    assert!(store.validate_movement("Oren", "Anywhere", 0));
}

#[test]
fn test_character_without_location_may_move() {
    let mut store = harbor_store();
    store.record_character(Character::named("Ilse"));
    assert!(store.validate_movement("Ilse", "Tower", 0));
}

#[test]
fn test_first_appearance_is_minimum_referencing_chapter() {
    let mut store = harbor_store();
    store.record_character(Character::named("Oren Hale"));

    for (chapter, text) in [
        (1, "Mara climbed the stairs alone."),
        (2, "Oren knocked twice. Mara did not answer."),
        (3, "Oren Hale left the harbor."),
    ] {
        for name in store.referenced_characters(text) {
            store.mark_appearance(&name, chapter).unwrap();
        }
    }

    assert_eq!(*store.character("Mara").unwrap().first_appearance(), 1);
    assert_eq!(*store.character("Oren Hale").unwrap().first_appearance(), 2);
}

#[test]
fn test_thread_resolves_only_when_all_conditions_completed() {
    let mut store = harbor_store();
    store.add_plot_thread(
        PlotThread::builder()
            .name("The drowned bell")
            .resolution_conditions(vec!["bell raised".to_string(), "keeper forgiven".to_string()])
            .build()
            .unwrap(),
    );

    assert_eq!(
        store.advance_plot_thread("The drowned bell", "bell raised").unwrap(),
        ThreadStatus::Active
    );
    let err = store.resolve_plot_thread("The drowned bell").unwrap_err();
    match err.kind {
        ContinuityErrorKind::UnresolvedConditions { missing, .. } => {
            assert_eq!(missing, vec!["keeper forgiven"])
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(
        store.advance_plot_thread("The drowned bell", "keeper forgiven").unwrap(),
        ThreadStatus::Resolved
    );
    assert!(store.can_resolve("The drowned bell").unwrap());

    let closed = store.advance_plot_thread("The drowned bell", "epilogue").unwrap_err();
    assert!(matches!(closed.kind, ContinuityErrorKind::ThreadClosed(_)));
    assert_eq!(
        store.plot_thread("The drowned bell").unwrap().key_events().len(),
        2
    );
}

#[test]
fn test_dependencies_gate_advancement() {
    let mut store = harbor_store();
    store.add_plot_thread(
        PlotThread::builder()
            .name("Revenge")
            .dependencies(vec!["Betrayal".to_string()])
            .build()
            .unwrap(),
    );
    let err = store.advance_plot_thread("Revenge", "a knife").unwrap_err();
    assert!(matches!(err.kind, ContinuityErrorKind::DependencyNotMet { .. }));

    store.add_plot_thread(PlotThread::builder().name("Betrayal").build().unwrap());
    assert_eq!(
        store.advance_plot_thread("Revenge", "a knife").unwrap(),
        ThreadStatus::Active
    );

    store.abandon_plot_thread("Betrayal").unwrap();
    assert!(store.advance_plot_thread("Revenge", "another knife").is_err());
    assert_eq!(store.active_plot_threads().len(), 1);
}

#[test]
fn test_updates_are_append_only_and_idempotent() {
    let mut store = harbor_store();
    let update = CharacterUpdate {
        status: Some(CharacterStatus::Injured),
        development: Some("learns the bell is real".into()),
        location: Some("Market".into()),
        emotion: Some("shaken".into()),
    };

    let first = store.update_character_status("Mara", 2, update.clone()).unwrap();
    assert!(first.status_changed && first.development_recorded && first.moved);

    let second = store.update_character_status("Mara", 2, update).unwrap();
    assert!(!second.status_changed && !second.development_recorded && !second.moved);

    let mara = store.character("Mara").unwrap();
    assert_eq!(mara.development_log().len(), 1);
    assert_eq!(mara.status_history().len(), 1);
    assert_eq!(mara.location().as_deref(), Some("Market"));
    assert_eq!(mara.emotional_state().as_deref(), Some("shaken"));
}

#[test]
fn test_timeline_write_once() {
    let mut store = harbor_store();
    store
        .record_timeline(1, TimelineEntry::new("one night", Some(1), "dawn", vec![]))
        .unwrap();
    let err = store
        .record_timeline(1, TimelineEntry::new("a week", Some(7), "dusk", vec![]))
        .unwrap_err();
    assert!(matches!(err.kind, ContinuityErrorKind::TimelineEntryExists(1)));
    assert_eq!(store.timeline().get(1).unwrap().elapsed(), "one night");
}

#[test]
fn test_book_snapshot_serialises() {
    let mut store = harbor_store();
    store.record_emotion(1, EmotionalBeat::new("unease", 4, "the bell"));
    let mut chapter = Chapter::draft(1, 1, "Low Tide", "The bell rang under water.");
    chapter.mark_validated().unwrap();
    chapter.finalize().unwrap();
    let mut manuscript = Manuscript::new();
    manuscript.push(chapter).unwrap();

    let book = Book::assemble(
        BookHeader::new("", "", ""),
        &store,
        manuscript,
        vec![],
        BookStatus::Partial {
            reason: "cancelled".into(),
        },
    );
    assert_eq!(book.title(), "Untitled");
    assert_eq!(book.total_words(), 5);

    let json = serde_json::to_value(&book).unwrap();
    assert_eq!(json["status"]["state"], "partial");
    assert_eq!(json["chapters"][0]["number"], 1);
    assert_eq!(json["emotional_arc"]["1"]["tension"], 4);

    let back: Book = serde_json::from_value(json).unwrap();
    assert_eq!(back, book);
}
