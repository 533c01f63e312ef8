// Planning, seeding and the repair loop against a scripted backend.

mod test_utils;

use scriptorium_continuity::{Chapter, ChapterStatus, ContinuityStore};
use scriptorium_narrative::{
    ConsistencyValidator, EngineConfig, IssueClass, NovelExecutor, ParseTier, PlanRequest,
    PlotPlanner, RepairConfig, RepairLoop, RepairState,
};
use test_utils::{PROSE_OUTLINE, StoryDriver, UNDERTOW_DRAFT};

fn request() -> PlanRequest {
    PlanRequest::new(3, "A harbor town hides a bell that rings under the sea.")
}

#[tokio::test]
async fn test_json_outline_parses_directly() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let plan = executor.plan(&request()).await?;

    assert_eq!(*plan.tier(), ParseTier::Direct);
    assert_eq!(plan.world_name(), "Tidewater");
    assert_eq!(plan.act_lengths(), &[1, 1, 1]);
    assert_eq!(
        plan.chapters().iter().map(|c| c.title().as_str()).collect::<Vec<_>>(),
        vec!["Low Tide", "The Undertow", "Bell Tower"]
    );
    assert_eq!(plan.motifs(), &vec!["bells".to_string(), "salt".to_string()]);

    let driver = executor.client().driver();
    assert_eq!(driver.calls_to("reformatter"), 0);
    assert_eq!(driver.calls_to("world_namer"), 0);
    Ok(())
}

#[tokio::test]
async fn test_prose_outline_is_reformatted() -> anyhow::Result<()> {
    let driver = StoryDriver::new().with_outline(PROSE_OUTLINE);
    let executor = NovelExecutor::new(driver, EngineConfig::for_testing());
    let plan = executor.plan(&request()).await?;

    assert_eq!(*plan.tier(), ParseTier::Reformatted);
    assert_eq!(plan.chapters().len(), 3);
    assert_eq!(executor.client().driver().calls_to("reformatter"), 1);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_outline_falls_back_to_headings() -> anyhow::Result<()> {
    let driver = StoryDriver::new()
        .with_outline(PROSE_OUTLINE)
        .with_reformatted("I could not produce JSON for this.");
    let executor = NovelExecutor::new(driver, EngineConfig::for_testing());
    let plan = executor.plan(&request()).await?;

    assert_eq!(*plan.tier(), ParseTier::KeyValue);
    assert_eq!(plan.chapters().len(), 3);
    assert_eq!(plan.chapters()[1].title(), "The Undertow");
    assert_eq!(plan.chapters()[1].summary(), "Mara searches the wreck alone.");
    Ok(())
}

#[tokio::test]
async fn test_seed_fills_the_store() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let request = request();
    let plan = executor.plan(&request).await?;
    let mut store = ContinuityStore::new(request.premise().as_str());
    PlotPlanner::seed(&plan, &request, &mut store)?;

    assert_eq!(store.world_name(), "Tidewater");
    assert_eq!(store.characters().len(), 3);
    assert!(store.characters().values().all(|c| !c.has_appeared()));
    assert!(store.plot_thread("The Bell").is_some());
    assert!(store.locations().contains("Tower"));
    assert_eq!(store.motif_for(2), Some("bells"));
    Ok(())
}

#[tokio::test]
async fn test_repair_removes_an_early_first_appearance() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let request = request();
    let plan = executor.plan(&request).await?;
    let mut store = ContinuityStore::new(request.premise().as_str());
    PlotPlanner::seed(&plan, &request, &mut store)?;
    store.mark_appearance("Mara", 1)?;

    let draft = Chapter::draft(2, 2, "The Undertow", UNDERTOW_DRAFT);
    let repair = RepairLoop::new(RepairConfig::default(), ConsistencyValidator::new());
    let outcome = repair
        .run(executor.client(), draft, &plan.chapters()[1], &store)
        .await?;

    assert_eq!(
        outcome.trail(),
        &vec![
            RepairState::Drafted,
            RepairState::Checking,
            RepairState::Flagged,
            RepairState::Repairing,
            RepairState::Checking,
            RepairState::Consistent,
        ]
    );
    assert!(outcome.is_consistent());
    assert!(!outcome.report().has_class(IssueClass::FirstAppearance));
    assert_eq!(*outcome.cycles(), 1);
    assert_eq!(*outcome.chapter().status(), ChapterStatus::Validated);
    assert!(!outcome.chapter().text().contains("Ilse"));
    Ok(())
}

#[tokio::test]
async fn test_repair_bound_keeps_flagged_draft() -> anyhow::Result<()> {
    let executor = NovelExecutor::new(StoryDriver::new(), EngineConfig::for_testing());
    let request = request();
    let plan = executor.plan(&request).await?;
    let mut store = ContinuityStore::new(request.premise().as_str());
    PlotPlanner::seed(&plan, &request, &mut store)?;
    store.mark_appearance("Mara", 1)?;

    let draft = Chapter::draft(2, 2, "The Undertow", UNDERTOW_DRAFT);
    let repair = RepairLoop::new(
        RepairConfig::default().with_max_cycles(0),
        ConsistencyValidator::new(),
    );
    let outcome = repair
        .run(executor.client(), draft, &plan.chapters()[1], &store)
        .await?;

    assert!(!outcome.is_consistent());
    assert_eq!(*outcome.cycles(), 0);
    assert_eq!(*outcome.chapter().status(), ChapterStatus::Flagged);
    assert_eq!(outcome.chapter().unresolved_issues().len(), 1);
    assert!(outcome.report().has_class(IssueClass::FirstAppearance));
    assert_eq!(executor.client().driver().calls_to("repair_editor"), 0);
    Ok(())
}
