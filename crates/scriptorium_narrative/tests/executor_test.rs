// Book runs against a scripted backend.
//
// The story has three chapters; Ilse is planned for the third but the
// second chapter's first draft brings her in early.

mod test_utils;

use scriptorium_continuity::{BookStatus, ChapterStatus};
use scriptorium_error::{NarrativeErrorKind, PlanningErrorKind, ScriptoriumErrorKind};
use scriptorium_narrative::{
    BookConfig, EngineConfig, FailurePolicy, NovelExecutor, PlanRequest, is_cancellation,
};
use test_utils::{ENDING, OPENER, StoryDriver};
use tokio_util::sync::CancellationToken;

fn request() -> PlanRequest {
    PlanRequest::new(3, "A harbor town hides a bell that rings under the sea.")
}

fn config_with_policy(policy: FailurePolicy) -> EngineConfig {
    EngineConfig::for_testing().with_book(
        BookConfig::default()
            .with_inter_chapter_delay_ms(0)
            .with_failure_policy(policy),
    )
}

#[tokio::test]
async fn test_early_character_is_repaired_before_commit() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let run = executor.run(request()).await;

    assert!(run.is_complete(), "run stopped early: {:?}", run.error);
    let chapters = run.book.chapters();
    assert_eq!(chapters.len(), 3);
    assert!(chapters.iter().all(|c| *c.status() == ChapterStatus::Finalized));
    assert_eq!(
        chapters.iter().map(|c| *c.number()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let undertow = &chapters[1];
    assert!(!undertow.text().contains("Ilse"));
    assert_eq!(*undertow.repair_passes(), 1);
    assert!(undertow.unresolved_issues().is_empty());

    let ilse = run
        .book
        .characters()
        .iter()
        .find(|c| c.name() == "Ilse")
        .ok_or_else(|| anyhow::anyhow!("Ilse missing from the book"))?;
    assert_eq!(*ilse.first_appearance(), 3);

    let driver = executor.client().driver();
    assert_eq!(driver.calls_to("repair_editor"), 1);
    assert_eq!(driver.calls_to("novelist"), 3);
    Ok(())
}

#[tokio::test]
async fn test_transitions_bridge_chapters() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let run = executor.run(request()).await;
    assert!(run.is_complete());

    let chapters = run.book.chapters();
    let last_line = ENDING.lines().last().unwrap_or_default();
    assert!(chapters[0].text().contains(last_line));
    assert!(chapters[1].text().contains(last_line));
    assert!(!chapters[2].text().contains(last_line));

    let driver = executor.client().driver();
    assert_eq!(driver.calls_to("ending_writer"), 2);
    assert_eq!(driver.calls_to("opener_writer"), 2);
    let drafts = driver.prompts_to("novelist");
    assert!(!drafts[0].contains(OPENER));
    assert!(drafts[1].contains(OPENER));
    Ok(())
}

#[tokio::test]
async fn test_finalized_chapters_carry_extracted_state() {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let run = executor.run(request()).await;

    let first = &run.book.chapters()[0];
    assert_eq!(
        first.summary().as_deref(),
        Some("The search for the bell goes on as the tide turns.")
    );
    assert!(first.active_threads().contains("The Bell"));
    assert_eq!(run.book.world_name(), "Tidewater");
    assert_eq!(run.book.title(), "The Drowned Bell");
    assert_eq!(run.book.timeline().len(), 3);
    assert!(run.book.emotional_arc().get(3).is_some());
}

#[tokio::test]
async fn test_skip_policy_keeps_numbering_contiguous() {
    let driver = StoryDriver::new().failing("The Undertow");
    let executor = NovelExecutor::new(driver, config_with_policy(FailurePolicy::Skip));
    let run = executor.run(request()).await;

    assert!(run.error.is_none());
    assert!(!run.is_complete());
    assert!(matches!(run.book.status(), BookStatus::Partial { .. }));

    let chapters = run.book.chapters();
    assert_eq!(chapters.len(), 2);
    assert_eq!(*chapters[1].number(), 2);
    assert_eq!(*chapters[1].plan_entry(), 3);

    let skipped = run.book.skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(*skipped[0].plan_entry(), 2);
    assert_eq!(skipped[0].title(), "The Undertow");
}

#[tokio::test]
async fn test_abort_policy_stops_the_run() {
    let driver = StoryDriver::new().failing("The Undertow");
    let executor = NovelExecutor::new(driver, config_with_policy(FailurePolicy::Abort));
    let run = executor.run(request()).await;

    assert_eq!(run.book.chapters().len(), 1);
    assert!(run.book.skipped().is_empty());
    let error = run.error.expect("abort should report an error");
    assert!(matches!(
        error.kind(),
        ScriptoriumErrorKind::Narrative(e)
            if matches!(e.kind, NarrativeErrorKind::ChapterAborted { chapter: 2, .. })
    ));
    assert_eq!(executor.client().driver().calls_to("opener_writer"), 1);
}

#[tokio::test]
async fn test_cancellation_keeps_finalized_chapters() {
    let token = CancellationToken::new();
    let driver = StoryDriver::new().cancelling("The Undertow", token.clone());
    let executor =
        NovelExecutor::new(driver, EngineConfig::for_testing()).with_cancellation(token);
    let run = executor.run(request()).await;

    let error = run.error.expect("cancellation should report an error");
    assert!(is_cancellation(&error));
    assert_eq!(run.book.chapters().len(), 1);
    assert!(run.book.skipped().is_empty());
    assert!(matches!(run.book.status(), BookStatus::Partial { .. }));

    let ilse = run.book.characters().iter().find(|c| c.name() == "Ilse");
    assert!(ilse.is_some_and(|c| !c.has_appeared()));
}

#[tokio::test(start_paused = true)]
async fn test_chapter_deadline_skips_a_stalled_chapter() {
    let driver = StoryDriver::new().stalling("The Undertow");
    let config = EngineConfig::for_testing().with_book(
        BookConfig::default()
            .with_inter_chapter_delay_ms(0)
            .with_chapter_deadline_secs(Some(30)),
    );
    let executor = NovelExecutor::new(driver, config);
    let run = executor.run(request()).await;

    assert!(run.error.is_none());
    assert_eq!(run.book.chapters().len(), 2);
    assert_eq!(*run.book.skipped()[0].plan_entry(), 2);
    assert!(run.book.skipped()[0].reason().contains("deadline"));
}

#[tokio::test]
async fn test_planning_failure_gives_empty_partial_book() {
    let driver = StoryDriver::new()
        .with_outline("I cannot help with that.")
        .with_reformatted("Sorry.");
    let executor = NovelExecutor::new(driver, EngineConfig::for_testing());
    let run = executor.run(request()).await;

    assert!(run.book.chapters().is_empty());
    assert_eq!(run.book.title(), "Untitled");
    assert!(matches!(run.book.status(), BookStatus::Partial { .. }));
    let error = run.error.expect("planning should fail");
    assert!(matches!(
        error.kind(),
        ScriptoriumErrorKind::Planning(e)
            if matches!(e.kind, PlanningErrorKind::TooFewChapters { expected: 3, found: 0 })
    ));
    assert_eq!(executor.client().driver().calls_to("novelist"), 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_call() {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let run = executor.run(PlanRequest::new(0, "A premise")).await;

    assert!(run.book.chapters().is_empty());
    assert!(run.error.is_some());
    assert_eq!(executor.client().driver().calls_to("planner"), 0);
}
