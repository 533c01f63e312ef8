//! Book orchestration.
//!
//! Chapters are written strictly in order. Each chapter's pipeline (draft,
//! check and repair, extraction, ending) only reads the continuity store;
//! the store and the manuscript change together in one synchronous commit
//! once the chapter is finalized. Cancelling or failing mid-chapter therefore
//! leaves no trace of that chapter, and every finalized chapter is kept.

use crate::client::{GenerationClient, is_cancellation};
use crate::generator::{ChapterGenerator, DraftContext};
use crate::parser::StructuredResponseParser;
use crate::planner::{BookPlan, ChapterPlan, PlanRequest, PlotPlanner};
use crate::repair::RepairLoop;
use crate::transition::{TransitionComposer, TransitionContext};
use crate::updater::{StateDelta, StateUpdater};
use crate::validator::ConsistencyValidator;
use crate::config::{EngineConfig, FailurePolicy};
use scriptorium_continuity::{
    Book, BookHeader, BookStatus, Chapter, ContinuityStore, Manuscript, SkippedChapter,
};
use scriptorium_error::{
    NarrativeError, NarrativeErrorKind, ScriptoriumError, ScriptoriumErrorKind, ScriptoriumResult,
};
use scriptorium_interface::ScriptoriumDriver;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A book and, when the run stopped early, why.
///
/// The book is always present: a failed run still carries every chapter
/// finalized before the failure.
#[derive(Debug)]
pub struct BookRun {
    /// The finished or partial book
    pub book: Book,
    /// The failure that stopped the run
    pub error: Option<ScriptoriumError>,
}

impl BookRun {
    /// Whether every planned chapter was produced.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.book.is_complete()
    }
}

/// A finalized chapter and the delta that goes with it, not yet committed.
struct PreparedChapter {
    chapter: Chapter,
    delta: StateDelta,
}

/// Plans and writes a book against one backend.
///
/// # Examples
///
/// ```rust,ignore
/// use scriptorium_narrative::{EngineConfig, NovelExecutor, PlanRequest};
///
/// let executor = NovelExecutor::new(driver, EngineConfig::default());
/// let run = executor
///     .run(PlanRequest::new(12, "A harbor town hides a drowned bell."))
///     .await;
/// println!("{} chapters", run.book.chapters().len());
/// ```
pub struct NovelExecutor<D: ScriptoriumDriver> {
    client: GenerationClient<D>,
    config: EngineConfig,
    planner: PlotPlanner,
    generator: ChapterGenerator,
    repair: RepairLoop,
    updater: StateUpdater,
    transitions: TransitionComposer,
    cancel: CancellationToken,
}

impl<D: ScriptoriumDriver> NovelExecutor<D> {
    /// Create an executor over a driver.
    pub fn new(driver: D, config: EngineConfig) -> Self {
        let cancel = CancellationToken::new();
        let parser = StructuredResponseParser::new(*config.parser().reformat_temperature());
        Self {
            client: GenerationClient::new(driver, config.generation().clone())
                .with_cancellation(cancel.clone()),
            planner: PlotPlanner::new(parser),
            generator: ChapterGenerator::new(config.chapter().clone()),
            repair: RepairLoop::new(config.repair().clone(), ConsistencyValidator::new()),
            updater: StateUpdater::new(),
            transitions: TransitionComposer::new(config.transition().clone()),
            config,
            cancel,
        }
    }

    /// Stop the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// The generation client.
    pub fn client(&self) -> &GenerationClient<D> {
        &self.client
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan a book without writing it.
    pub async fn plan(&self, request: &PlanRequest) -> ScriptoriumResult<BookPlan> {
        self.cancellable(0, self.planner.plan(&self.client, request))
            .await
    }

    /// Plan and write a book.
    ///
    /// Never fails outright: planning failures give an empty partial book,
    /// and later failures give the chapters finalized so far.
    #[tracing::instrument(skip_all, fields(chapters = request.num_chapters(), provider = self.client.driver().provider_name()))]
    pub async fn run(&self, request: PlanRequest) -> BookRun {
        let mut store = ContinuityStore::new(request.premise().as_str());
        let plan = match self.plan(&request).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Planning failed");
                return stopped(BookHeader::default(), &store, Manuscript::new(), Vec::new(), e);
            }
        };
        if let Err(e) = PlotPlanner::seed(&plan, &request, &mut store) {
            error!(error = %e, "Seeding the continuity store failed");
            return stopped(plan.header().clone(), &store, Manuscript::new(), Vec::new(), e);
        }
        self.write(&plan, store).await
    }

    async fn write(&self, plan: &BookPlan, mut store: ContinuityStore) -> BookRun {
        let entries = plan.chapters();
        let total = entries.len();
        let delay = Duration::from_millis(*self.config.book().inter_chapter_delay_ms());
        let mut manuscript = Manuscript::new();
        let mut skipped = Vec::new();
        let mut opening: Option<String> = None;
        let mut failure: Option<ScriptoriumError> = None;

        for (index, entry) in entries.iter().enumerate() {
            let plan_entry = *entry.number();
            if self.cancel.is_cancelled() {
                failure = Some(NarrativeError::new(NarrativeErrorKind::Cancelled(plan_entry)).into());
                break;
            }
            let next = entries.get(index + 1);
            let ctx = DraftContext {
                number: manuscript.next_number(),
                total,
                plan: entry,
                store: &store,
                previous: manuscript.last(),
                opening: opening.as_deref(),
            };
            info!(plan_entry, chapter = ctx.number, title = %entry.title(), "Writing chapter");
            let prepared = self
                .guarded(plan_entry, self.prepare_chapter(ctx, next))
                .await;

            match prepared {
                Ok(PreparedChapter { chapter, delta }) => {
                    let report = self.updater.apply(&delta, &mut store);
                    let (number, words) = (*chapter.number(), *chapter.word_count());
                    if let Err(e) = manuscript.push(chapter) {
                        error!(error = %e, "Chapter could not be added to the manuscript");
                        failure = Some(e.into());
                        break;
                    }
                    info!(
                        chapter = number,
                        words,
                        rejected_moves = report.rejected_moves().len(),
                        "Chapter finalized"
                    );
                }
                Err(e) if is_cancellation(&e) => {
                    warn!(plan_entry, "Run cancelled, dropping the chapter in progress");
                    failure = Some(e);
                    break;
                }
                Err(e) if is_chapter_failure(&e)
                    && *self.config.book().failure_policy() == FailurePolicy::Skip =>
                {
                    warn!(plan_entry, error = %e, "Chapter failed, skipping it");
                    skipped.push(SkippedChapter::new(plan_entry, entry.title(), reason(&e)));
                    opening = None;
                    continue;
                }
                Err(e) => {
                    error!(plan_entry, error = %e, "Chapter failed, stopping the run");
                    failure = Some(if is_chapter_failure(&e) {
                        NarrativeError::new(NarrativeErrorKind::ChapterAborted {
                            chapter: plan_entry,
                            reason: reason(&e),
                        })
                        .into()
                    } else {
                        e
                    });
                    break;
                }
            }

            opening = None;
            let Some(next) = next else { continue };
            if let Some(previous) = manuscript.last() {
                match self
                    .cancellable(*next.number(), self.opener(previous, &store, next))
                    .await
                {
                    Ok(composed) => opening = composed,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            if !delay.is_zero() {
                let cancelled = tokio::select! {
                    _ = self.cancel.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    failure = Some(
                        NarrativeError::new(NarrativeErrorKind::Cancelled(*next.number())).into(),
                    );
                    break;
                }
            }
        }

        let status = match (&failure, skipped.is_empty()) {
            (None, true) => BookStatus::Complete,
            (None, false) => BookStatus::Partial {
                reason: format!("{} of {} chapters skipped", skipped.len(), total),
            },
            (Some(e), _) => BookStatus::Partial { reason: reason(e) },
        };
        info!(
            chapters = manuscript.len(),
            skipped = skipped.len(),
            words = manuscript.total_words(),
            complete = failure.is_none() && skipped.is_empty(),
            "Book run finished"
        );
        BookRun {
            book: Book::assemble(plan.header().clone(), &store, manuscript, skipped, status),
            error: failure,
        }
    }

    /// Draft, check, extract and end one chapter without touching the store.
    async fn prepare_chapter(
        &self,
        ctx: DraftContext<'_>,
        next: Option<&ChapterPlan>,
    ) -> ScriptoriumResult<PreparedChapter> {
        let draft = self.generator.generate(&self.client, &ctx).await?;
        let outcome = self
            .repair
            .run(&self.client, draft, ctx.plan, ctx.store)
            .await?;
        let mut chapter = outcome.into_chapter();
        let mut delta = self
            .updater
            .extract(&self.client, &chapter, ctx.store, ctx.plan.summary())
            .await?;

        if let Some(next) = next.filter(|_| self.transitions.enabled()) {
            let tail = self.transitions.tail_of(&chapter);
            let transition = TransitionContext {
                tail: &tail,
                beat: delta.emotion().as_ref(),
                end_time: delta
                    .timeline()
                    .as_ref()
                    .map(|t| t.end_time().as_str())
                    .filter(|t| !t.is_empty()),
                motif: ctx.store.motif_for(ctx.number),
                summary: delta.summary().as_deref(),
            };
            match self
                .transitions
                .compose_ending(&self.client, &transition, Some(next))
                .await
            {
                Ok(ending) => {
                    chapter.splice_ending(&ending)?;
                    delta.rescan(chapter.text(), ctx.store);
                }
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => warn!(error = %e, "Ending not composed, keeping the drafted ending"),
            }
        }

        let summary = delta
            .summary()
            .clone()
            .unwrap_or_else(|| ctx.plan.summary().clone());
        chapter.set_summary(summary)?;

        let mut threads: BTreeSet<String> = delta.advanced_threads();
        threads.extend(chapter.scenes().iter().flat_map(|s| s.threads().iter().cloned()));
        threads.extend(
            ctx.plan
                .plot_threads()
                .iter()
                .filter(|t| !t.trim().is_empty())
                .cloned(),
        );
        chapter.set_active_threads(threads)?;
        chapter.set_character_developments(delta.developments(ctx.store))?;
        chapter.finalize()?;
        Ok(PreparedChapter { chapter, delta })
    }

    /// Opening paragraph for `next`; only cancellation is an error.
    async fn opener(
        &self,
        previous: &Chapter,
        store: &ContinuityStore,
        next: &ChapterPlan,
    ) -> ScriptoriumResult<Option<String>> {
        if !self.transitions.enabled() {
            return Ok(None);
        }
        let tail = self.transitions.tail_of(previous);
        let ctx = TransitionContext::finalized(previous, &tail, store);
        match self.transitions.compose_opener(&self.client, &ctx, next).await {
            Ok(opener) => Ok(Some(opener)),
            Err(e) if is_cancellation(&e) => Err(e),
            Err(e) => {
                warn!(error = %e, "Opener not composed");
                Ok(None)
            }
        }
    }

    /// Race `work` against cancellation.
    async fn cancellable<T>(
        &self,
        plan_entry: usize,
        work: impl Future<Output = ScriptoriumResult<T>>,
    ) -> ScriptoriumResult<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(NarrativeError::new(NarrativeErrorKind::Cancelled(plan_entry)).into())
            }
            result = work => result,
        }
    }

    /// Race `work` against cancellation and the chapter deadline.
    async fn guarded<T>(
        &self,
        plan_entry: usize,
        work: impl Future<Output = ScriptoriumResult<T>>,
    ) -> ScriptoriumResult<T> {
        let deadline = *self.config.book().chapter_deadline_secs();
        let bounded = async move {
            match deadline {
                Some(seconds) => {
                    match tokio::time::timeout(Duration::from_secs(seconds), work).await {
                        Ok(result) => result,
                        Err(_) => Err(NarrativeError::new(NarrativeErrorKind::ChapterDeadline {
                            chapter: plan_entry,
                            seconds,
                        })
                        .into()),
                    }
                }
                None => work.await,
            }
        };
        self.cancellable(plan_entry, bounded).await
    }
}

/// Failures the failure policy applies to.
fn is_chapter_failure(error: &ScriptoriumError) -> bool {
    error.is_backend_failure()
        || matches!(
            error.kind(),
            ScriptoriumErrorKind::Narrative(e)
                if matches!(e.kind, NarrativeErrorKind::ChapterDeadline { .. })
        )
}

/// The failure without its source location.
fn reason(error: &ScriptoriumError) -> String {
    match error.kind() {
        ScriptoriumErrorKind::Generation(e) => e.kind.to_string(),
        ScriptoriumErrorKind::Server(e) => e.kind.to_string(),
        ScriptoriumErrorKind::Planning(e) => e.kind.to_string(),
        ScriptoriumErrorKind::Narrative(e) => e.kind.to_string(),
        ScriptoriumErrorKind::Continuity(e) => e.kind.to_string(),
        _ => error.to_string(),
    }
}

fn stopped(
    header: BookHeader,
    store: &ContinuityStore,
    manuscript: Manuscript,
    skipped: Vec<SkippedChapter>,
    error: ScriptoriumError,
) -> BookRun {
    let status = BookStatus::Partial {
        reason: reason(&error),
    };
    BookRun {
        book: Book::assemble(header, store, manuscript, skipped, status),
        error: Some(error),
    }
}
