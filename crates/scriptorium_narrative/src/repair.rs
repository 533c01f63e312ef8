//! Bounded repair of flagged drafts.

use crate::RepairConfig;
use crate::client::{GenerationClient, PromptSpec, is_cancellation};
use crate::planner::ChapterPlan;
use crate::prompts::{self, roles};
use crate::validator::{ConsistencyIssue, ConsistencyReport, ConsistencyValidator, IssueClass};
use derive_getters::Getters;
use scriptorium_continuity::{Chapter, ContinuityStore};
use scriptorium_error::{ScriptoriumError, ScriptoriumResult};
use scriptorium_interface::ScriptoriumDriver;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// States a draft passes through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
pub enum RepairState {
    /// Freshly generated
    Drafted,
    /// Under consistency check
    Checking,
    /// Passed the check
    Consistent,
    /// Failed the check
    Flagged,
    /// Being regenerated with the issue list
    Repairing,
}

/// Result of running a draft through check and repair.
#[derive(Debug, Clone, Getters)]
pub struct RepairOutcome {
    /// `Validated` when consistent, otherwise `Flagged` with the unresolved issues
    chapter: Chapter,
    report: ConsistencyReport,
    /// Repair passes made
    cycles: usize,
    trail: Vec<RepairState>,
}

impl RepairOutcome {
    /// Whether the kept draft passed the check.
    pub fn is_consistent(&self) -> bool {
        self.report.is_consistent()
    }

    /// Give up the chapter.
    pub fn into_chapter(self) -> Chapter {
        self.chapter
    }
}

/// Drives `Drafted → Checking → {Consistent, Flagged}` and
/// `Flagged → Repairing → Checking`, at most `max_cycles` times.
///
/// When the bound is reached the draft with the fewest issues is kept, the
/// later one on a tie. Backend failures while checking or repairing end the
/// loop with the best draft so far and an unresolved note.
#[derive(Debug, Clone)]
pub struct RepairLoop {
    config: RepairConfig,
    validator: ConsistencyValidator,
}

impl RepairLoop {
    /// Create a loop.
    pub fn new(config: RepairConfig, validator: ConsistencyValidator) -> Self {
        Self { config, validator }
    }

    /// Check `chapter` and repair it as needed.
    #[tracing::instrument(skip_all, fields(chapter = chapter.number()))]
    pub async fn run<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        mut chapter: Chapter,
        plan: &ChapterPlan,
        store: &ContinuityStore,
    ) -> ScriptoriumResult<RepairOutcome> {
        let number = *chapter.number();
        let max_cycles = *self.config.max_cycles();
        let mut trail = vec![RepairState::Drafted];
        let mut best: Option<(Chapter, ConsistencyReport)> = None;
        let mut cycles = 0;

        loop {
            trail.push(RepairState::Checking);
            let report = match self
                .validator
                .check(client, chapter.text(), number, plan, store)
                .await
            {
                Ok(report) => report,
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Consistency check failed, keeping best draft");
                    return degrade(chapter, best, cycles, trail, "consistency check", &e);
                }
            };

            if report.is_consistent() {
                trail.push(RepairState::Consistent);
                chapter.mark_validated()?;
                info!(cycles, "Chapter consistent");
                return Ok(RepairOutcome {
                    chapter,
                    report,
                    cycles,
                    trail,
                });
            }

            trail.push(RepairState::Flagged);
            chapter.mark_flagged(report.notes())?;
            let better = best
                .as_ref()
                .is_none_or(|(_, kept)| report.issues().len() <= kept.issues().len());
            if better {
                best = Some((chapter.clone(), report.clone()));
            }

            if cycles >= max_cycles {
                break;
            }

            trail.push(RepairState::Repairing);
            let spec = PromptSpec::new(
                roles::REPAIR_EDITOR,
                prompts::repair(
                    chapter.text(),
                    &report.notes(),
                    &store.render_projection(number),
                    plan,
                ),
            )
            .with_temperature(0.5);
            match client.generate(&spec).await {
                Ok(text) => {
                    chapter.revise(text)?;
                    cycles += 1;
                    info!(cycle = cycles, issues = report.issues().len(), "Chapter repaired");
                }
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Repair failed, keeping best draft");
                    return degrade(chapter, best, cycles, trail, "repair", &e);
                }
            }
        }

        let (chapter, report) = match best {
            Some(kept) => kept,
            None => (chapter, ConsistencyReport::default()),
        };
        for issue in report.issues() {
            warn!(class = %issue.class(), issue = %issue.description(), "Unresolved continuity issue");
        }
        Ok(RepairOutcome {
            chapter,
            report,
            cycles,
            trail,
        })
    }
}

/// End the loop after a backend failure with the best flagged draft, or the
/// current draft flagged with a note about the failure.
fn degrade(
    current: Chapter,
    best: Option<(Chapter, ConsistencyReport)>,
    cycles: usize,
    trail: Vec<RepairState>,
    stage: &str,
    error: &ScriptoriumError,
) -> ScriptoriumResult<RepairOutcome> {
    let note = ConsistencyIssue::local(IssueClass::Other, format!("{} unavailable: {}", stage, error));
    let (chapter, report) = match best {
        Some((mut chapter, report)) => {
            chapter.add_unresolved(note.note())?;
            let mut issues = report.issues().clone();
            issues.push(note);
            (chapter, ConsistencyReport::new(issues))
        }
        None => {
            let mut chapter = current;
            let report = ConsistencyReport::new(vec![note]);
            chapter.mark_flagged(report.notes())?;
            (chapter, report)
        }
    };
    Ok(RepairOutcome {
        chapter,
        report,
        cycles,
        trail,
    })
}
