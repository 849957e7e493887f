//! Fixed-point driver (`do_helper`).
//!
//! Replaces the original's `goto start` loop with the explicit loop
//! Design Notes §9 recommends: `while !done && passes < limit { pass();
//! if no_progress { escalate_or_fail(); } }`.

use crate::candidates::{brute_search_all_modules, compute_address};
use crate::comparator::{run_pre_cmp, CompareOutcome};
use crate::config::MatcherConfig;
use crate::error::{MatchError, Result};
use crate::reloc::RelocationTable;
use crate::state::Matcher;
use crate::target::{Checkpoint, ModuleEnumerator, PreImage, TargetMemory};
use crate::types::{MatchReport, SectionDescriptor, Stage};

/// Outcome of a single section's search at the current stage
/// (`search_for_match`'s original return convention of 0/1, reified).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionOutcome {
    Matched,
    Defer,
}

/// Try matching a section against a candidate run-time address
/// (`try_addr`).
///
/// On a match, commits `Tentative` bindings to `Committed`, appends a
/// safety record, and binds the section's own name to the matched
/// address so other sections can narrow against it on a later pass.
/// The original only does this binding when the candidate set wasn't
/// already singular (`create_nameval = !singular(glob)`); always binding
/// it here is harmless (a unique-candidate match simply rebinds its own
/// name to the value it already had) and is required for a unique match
/// at stage one to produce a usable symbol binding in the report — see
/// DESIGN.md.
#[allow(clippy::too_many_arguments)]
fn try_addr(
    section: &SectionDescriptor,
    run_addr: u64,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    matcher: &mut Matcher,
) -> bool {
    let outcome = run_pre_cmp(
        run_addr,
        section.pre_addr,
        section.size,
        target,
        pre,
        relocations,
        matcher.bindings_mut(),
    );

    match outcome {
        CompareOutcome::Match => {
            matcher.commit_section();
            matcher.record_safety(run_addr, section.size);
            matcher.bind_committed(section.name.clone(), run_addr as i64);
            tracing::trace!(section = %section.name, run_addr = %format_args!("{run_addr:#x}"), "run-pre: found section");
            true
        }
        CompareOutcome::Mismatch(reason) => {
            matcher.rollback_section();
            tracing::debug!(
                section = %section.name,
                run_addr = %format_args!("{run_addr:#x}"),
                pre_addr = %format_args!("{:#x}", section.pre_addr),
                size = section.size,
                %reason,
                "run-pre: section does not match",
            );
            false
        }
    }
}

/// Search for a section's match at the current `stage`
/// (`search_for_match`).
#[allow(clippy::too_many_arguments)]
fn search_for_match(
    section: &SectionDescriptor,
    stage: Stage,
    config: &MatcherConfig,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    modules: &dyn ModuleEnumerator,
    matcher: &mut Matcher,
    checkpoint: &mut dyn Checkpoint,
) -> SectionOutcome {
    let glob = compute_address(section, matcher);

    if stage <= Stage::Unique && !glob.singular() {
        return SectionOutcome::Defer;
    }

    if config.debug.wants_detail() {
        tracing::trace!(section = %section.name, "run-pre: starting section search");
    }

    for candidate in glob.iter() {
        if checkpoint.tick() {
            return SectionOutcome::Defer;
        }
        if try_addr(section, candidate, target, pre, relocations, matcher) {
            return SectionOutcome::Matched;
        }
    }

    if stage <= Stage::AnyCandidate {
        return SectionOutcome::Defer;
    }

    // Stage::Brute: scan all loaded modules. Diagnostics are silenced
    // for the duration.
    if let Some(addr) = brute_search_all_modules(
        section,
        modules,
        target,
        pre,
        relocations,
        &config.own_module_prefix,
        &config.own_module_suffix,
        checkpoint,
    ) {
        try_addr(section, addr, target, pre, relocations, matcher);
    }

    SectionOutcome::Defer
}

/// Run the fixed-point matcher to completion over every section
/// (`do_helper`).
///
/// Sections of size zero are treated as already finished without ever
/// being searched.
#[allow(clippy::too_many_arguments)]
pub fn do_helper(
    sections: &[SectionDescriptor],
    config: &MatcherConfig,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    modules: &dyn ModuleEnumerator,
    checkpoint: &mut dyn Checkpoint,
) -> Result<MatchReport> {
    let mut matcher = Matcher::new();
    let mut finished = vec![false; sections.len()];
    for (i, section) in sections.iter().enumerate() {
        if section.is_trivial() {
            finished[i] = true;
        }
    }

    let mut stage = Stage::Unique;
    let mut old_finished = 0usize;
    let mut restart_count = 0u32;

    loop {
        for (i, section) in sections.iter().enumerate() {
            if finished[i] {
                continue;
            }
            if search_for_match(
                section,
                stage,
                config,
                target,
                pre,
                relocations,
                modules,
                &mut matcher,
                checkpoint,
            ) == SectionOutcome::Matched
            {
                finished[i] = true;
            }
        }

        let num_finished = finished.iter().filter(|&&f| f).count();
        if num_finished == sections.len() {
            return Ok(matcher.into_report());
        }

        if old_finished == num_finished {
            match stage.escalate() {
                Some(next) if next <= config.max_stage => {
                    stage = next;
                }
                _ => {
                    let remaining = sections
                        .iter()
                        .zip(finished.iter())
                        .filter(|(_, &done)| !done)
                        .map(|(s, _)| s.name.clone())
                        .collect();
                    return Err(MatchError::UnmatchedSections { remaining });
                }
            }
        } else {
            old_finished = num_finished;

            if restart_count >= config.restart_limit {
                return Err(MatchError::RestartLimitExceeded {
                    restarts: restart_count,
                });
            }
            restart_count += 1;
        }
    }
}
