//! Role instructions and prompt assembly.

use crate::generator::DraftContext;
use crate::planner::{ChapterPlan, PlanRequest};
use crate::transition::TransitionContext;
use std::fmt::Write;

/// System-role instructions, one per kind of backend call.
pub mod roles {
    /// Builds the book outline.
    pub const PLANNER: &str = "You are a master story architect. You design novels chapter by \
chapter, balancing a three-act structure, and you answer with a single JSON object.";

    /// Rewrites malformed structured output.
    pub const REFORMATTER: &str = "You convert text into valid JSON. Output only the JSON \
document, with no commentary and no code fences.";

    /// Names the story world.
    pub const WORLD_NAMER: &str = "You name fictional worlds. Answer with the name only, on \
one line.";

    /// Chooses recurring motifs.
    pub const MOTIF_WRITER: &str = "You choose recurring literary motifs. Answer with a short \
comma-separated list.";

    /// Drafts and expands chapters.
    pub const NOVELIST: &str = "You are a novelist writing one chapter of a longer book. You \
keep strict continuity with everything that came before and never introduce characters \
ahead of their planned chapter.";

    /// Judges a draft against the continuity state.
    pub const CONTINUITY_EDITOR: &str = "You are a continuity editor. You compare a chapter \
draft with the established story state and report contradictions. If there are none, \
answer with the single word CONSISTENT.";

    /// Rewrites a flagged draft.
    pub const REPAIR_EDITOR: &str = "You are a revising editor. You fix only the listed \
continuity problems in a chapter and keep every plot beat, scene and line of dialogue that \
is not affected.";

    /// Pulls state changes out of a finished chapter.
    pub const STATE_EXTRACTOR: &str = "You extract story state from a finished chapter and \
answer strictly in the requested line format.";

    /// Summarises a finished chapter.
    pub const SUMMARIZER: &str = "You summarise chapters of a novel in two or three plain \
sentences.";

    /// Writes chapter endings.
    pub const ENDING_WRITER: &str = "You write the closing paragraphs of novel chapters. \
Endings leave a question open and pull the reader into the next chapter.";

    /// Writes chapter openings.
    pub const OPENER_WRITER: &str = "You write the opening paragraph of novel chapters. \
Openings make the passage of time since the previous chapter explicit.";
}

/// Outline request for a new book.
pub fn outline(request: &PlanRequest, template_json: &str) -> String {
    let mut prompt = format!(
        "Plan a novel of exactly {} chapters.\n\nPREMISE:\n{}\n",
        request.num_chapters(),
        request.premise()
    );
    if !request.characters().is_empty() {
        prompt.push_str("\nCHARACTERS THE AUTHOR REQUIRES:\n");
        for seed in request.characters() {
            let _ = writeln!(prompt, "- {}: {}", seed.name(), seed.description());
        }
    }
    if !request.themes().is_empty() {
        let _ = writeln!(prompt, "\nTHEMES: {}", request.themes().join(", "));
    }
    let _ = write!(
        prompt,
        "\nGive every chapter a distinct title and a summary of what happens in it. Name the \
world and use that name consistently. List each location with the locations reachable \
from it and the travel time in whole units. Give each plot thread the events that must \
happen before it can be resolved, using the same wording you use in the chapter summaries. \
Suggest up to five recurring motifs.\n\nAnswer with JSON in exactly this shape:\n{}\n",
        template_json
    );
    prompt
}

/// Ask the backend to rewrite its own output into the template shape.
pub fn reformat(text: &str, template_json: &str) -> String {
    format!(
        "Rewrite the following text as JSON with exactly this shape:\n{}\n\nEvery key must be \
present. Use empty strings or empty lists for anything the text does not say.\n\nTEXT:\n{}\n",
        template_json, text
    )
}

/// One-line world-name request.
pub fn world_name(premise: &str, outline_text: &str) -> String {
    format!(
        "Give the world of this story a proper name.\n\nPREMISE:\n{}\n\nOUTLINE:\n{}\n",
        premise,
        excerpt(outline_text, 2000)
    )
}

/// Motif-list request.
pub fn motifs(premise: &str, themes: &[String]) -> String {
    let mut prompt = format!(
        "List three to five concrete recurring motifs (images, objects or phrases) for this \
story.\n\nPREMISE:\n{}\n",
        premise
    );
    if !themes.is_empty() {
        let _ = writeln!(prompt, "THEMES: {}", themes.join(", "));
    }
    prompt
}

/// Chapter drafting prompt.
///
/// Only characters introduced before this chapter are described, together
/// with the profiles of the characters the plan brings in now.
pub fn chapter(ctx: &DraftContext<'_>) -> String {
    let store = ctx.store;
    let mut prompt = format!(
        "Write chapter {} of {} of the novel.\n\nPREMISE:\n{}\n",
        ctx.number,
        ctx.total,
        store.premise()
    );
    if !store.world_name().is_empty() {
        let _ = writeln!(
            prompt,
            "\nWORLD: {} (always use this exact name)",
            store.world_name()
        );
    }

    let _ = write!(
        prompt,
        "\nTHIS CHAPTER ({}): {}\n{}\n",
        ctx.plan.act(),
        ctx.plan.title(),
        ctx.plan.summary()
    );
    if !ctx.plan.locations().is_empty() {
        let _ = writeln!(prompt, "Locations: {}", ctx.plan.locations().join(", "));
    }

    let earlier: Vec<_> = store
        .summaries()
        .range(..ctx.number.saturating_sub(1))
        .collect();
    if !earlier.is_empty() {
        prompt.push_str("\nEARLIER CHAPTERS:\n");
        for (number, summary) in earlier {
            let _ = writeln!(prompt, "- Chapter {}: {}", number, summary);
        }
    }

    match ctx.previous {
        Some(previous) => {
            let _ = write!(
                prompt,
                "\nPREVIOUS CHAPTER ({}), FULL TEXT:\n{}\n",
                previous.title(),
                previous.clean_text()
            );
        }
        None => {
            if let Some(summary) = store.summary(ctx.number.saturating_sub(1)) {
                let _ = write!(prompt, "\nPREVIOUS CHAPTER SUMMARY:\n{}\n", summary);
            }
        }
    }

    let introduced = store.introduced_characters(ctx.number);
    if !introduced.is_empty() {
        prompt.push_str("\nCHARACTERS ALREADY IN THE STORY:\n");
        for character in introduced {
            let _ = writeln!(prompt, "- {}", character.profile_line());
        }
    }
    let newcomers: Vec<_> = ctx
        .plan
        .characters()
        .iter()
        .filter_map(|name| store.character(name))
        .filter(|c| !c.has_appeared())
        .collect();
    if !newcomers.is_empty() {
        prompt.push_str("\nCHARACTERS INTRODUCED IN THIS CHAPTER:\n");
        for character in newcomers {
            let _ = writeln!(prompt, "- {}", character.profile_line());
        }
    }

    let threads = store.active_plot_threads();
    if !threads.is_empty() {
        prompt.push_str("\nACTIVE PLOT THREADS:\n");
        for thread in threads {
            let _ = writeln!(prompt, "- {}", thread.summary_line());
        }
    }

    if !store.timeline().is_empty() {
        prompt.push_str("\nTIMELINE:\n");
        for (number, entry) in store.timeline().iter() {
            let _ = writeln!(prompt, "- Chapter {}: {}", number, entry.describe());
        }
    }
    if let Some(beat) = store.emotional_arc().get(ctx.number.saturating_sub(1)) {
        let _ = writeln!(prompt, "\nPREVIOUS EMOTIONAL BEAT: {}", beat.describe());
    }
    if let Some(motif) = store.motif_for(ctx.number) {
        let _ = writeln!(prompt, "\nRECURRING MOTIF TO WEAVE IN: {}", motif);
    }
    if let Some(opening) = ctx.opening {
        let _ = write!(
            prompt,
            "\nOPEN THE CHAPTER WITH THIS PARAGRAPH (you may polish it):\n{}\n",
            opening
        );
    }

    prompt.push_str(
        "\nSeparate scenes with blank lines. Begin each scene with annotations such as \
[POV: name] [Location: place] [Time: units elapsed]. Do not bring in any character who is \
not listed above. Write the full chapter in prose.\n",
    );
    prompt
}

/// Expansion request for a draft that came back short.
pub fn expansion(original: &str, draft: &str, minimum: usize) -> String {
    format!(
        "{}\n\nA previous attempt came back too short. Expand it to at least {} words, deepening \
the scenes without changing what happens.\n\nSHORT DRAFT:\n{}\n",
        original, minimum, draft
    )
}

/// Consistency check request.
pub fn consistency(draft: &str, projection: &str, plan: &ChapterPlan) -> String {
    format!(
        "ESTABLISHED STORY STATE:\n{}\n\nCHAPTER PLAN: {}\n{}\nCharacters planned for this \
chapter: {}\n\nCHAPTER DRAFT:\n{}\n\nCheck the draft for: characters appearing before they \
were introduced, a world or setting name that differs from the established one, events out \
of chronological order, characters acting against their recorded status (for example a dead \
character acting), and impossible movement between locations. If there are no problems, \
answer CONSISTENT. Otherwise answer with a numbered list of problems, one per line.\n",
        projection,
        plan.title(),
        plan.summary(),
        names_or_none(plan.characters()),
        draft
    )
}

/// Repair request for a flagged draft.
pub fn repair(draft: &str, issues: &[String], projection: &str, plan: &ChapterPlan) -> String {
    let mut prompt = format!(
        "ESTABLISHED STORY STATE:\n{}\n\nCHAPTER PLAN: {}\n{}\nCharacters planned for this \
chapter: {}\n\nPROBLEMS TO FIX:\n",
        projection,
        plan.title(),
        plan.summary(),
        names_or_none(plan.characters())
    );
    for (i, issue) in issues.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, issue);
    }
    let _ = write!(
        prompt,
        "\nRewrite the chapter below, fixing only these problems. Where a character appears \
who has not been introduced, remove them or replace them with a character who has. Keep the \
scene annotations.\n\nCHAPTER DRAFT:\n{}\n",
        draft
    );
    prompt
}

/// State extraction request; the answer format is what the updater parses.
pub fn extraction(chapter_text: &str, known: &[String], threads: &[String]) -> String {
    format!(
        "Read the chapter and report the story state at its end.\n\nKNOWN CHARACTERS: {}\n\
ACTIVE PLOT THREADS: {}\n\nFor every character who appears, write one line:\n\
NAME: status | one-line development | relationships (Other: description; ...) | current \
location | emotional state\nUse alive, dead, injured or a short custom status. Write none for \
anything that does not apply.\n\nThen write:\nTIME_ELAPSED: how much time passes in the \
chapter\nTIME_UNITS: the same as a whole number of travel units\nEND_TIME: the time at the \
end of the chapter\nTIME_MARKERS: explicit time phrases, comma separated\nEMOTION: the \
dominant emotion\nTENSION: a number from 1 to 10\nUNRESOLVED: what the chapter leaves \
open\n\nFor every plot thread that advances, write one line:\nTHREAD: thread name | EVENT: \
what happened\n\nCHAPTER:\n{}\n",
        names_or_none(known),
        names_or_none(threads),
        chapter_text
    )
}

/// Chapter summary request.
pub fn summary(chapter_text: &str) -> String {
    format!("Summarise this chapter.\n\nCHAPTER:\n{}\n", chapter_text)
}

fn transition_inputs(ctx: &TransitionContext<'_>) -> String {
    let mut out = String::new();
    if let Some(summary) = ctx.summary {
        let _ = writeln!(out, "CHAPTER SUMMARY: {}", summary);
    }
    if let Some(beat) = ctx.beat {
        let _ = writeln!(out, "EMOTIONAL BEAT: {}", beat.describe());
    }
    if let Some(end_time) = ctx.end_time {
        let _ = writeln!(out, "TIME AT CHAPTER END: {}", end_time);
    }
    if let Some(motif) = ctx.motif {
        let _ = writeln!(out, "MOTIF: {}", motif);
    }
    let _ = write!(out, "\nCLOSING PASSAGE:\n{}\n", ctx.tail);
    out
}

/// Request for a new closing passage.
pub fn ending(ctx: &TransitionContext<'_>, next: Option<&ChapterPlan>) -> String {
    let mut prompt = transition_inputs(ctx);
    if let Some(next) = next {
        let _ = writeln!(prompt, "\nNEXT CHAPTER: {}: {}", next.title(), next.summary());
    }
    prompt.push_str(
        "\nWrite one or two paragraphs that replace the last paragraph of this passage. End on \
unresolved tension. Do not summarise and do not resolve the open question.\n",
    );
    prompt
}

/// Request for the next chapter's opening paragraph.
pub fn opener(ctx: &TransitionContext<'_>, next: &ChapterPlan) -> String {
    let mut prompt = transition_inputs(ctx);
    let _ = write!(
        prompt,
        "\nNEXT CHAPTER: {}: {}\n\nWrite one opening paragraph for the next chapter. State \
explicitly how much time has passed (for example \"the next morning\") and carry the mood \
forward.\n",
        next.title(),
        next.summary()
    );
    prompt
}

fn names_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
