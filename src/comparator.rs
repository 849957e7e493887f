//! Byte comparator — `run_pre_cmp`.
//!
//! Walks pre- and run-image bytes in lockstep, tolerating relocations,
//! no-op padding, jump operands, and a function-epilogue tail, while
//! rejecting genuine content differences.

use std::collections::HashMap;

use crate::heuristics::{jumplen, match_nop};
use crate::reloc::{handle_myst_reloc, AbortReason, RelocVerdict, RelocationTable};
use crate::target::{PreImage, TargetMemory};
use crate::types::Binding;

const RET: u8 = 0xC3;
const POP_EBX: u8 = 0x5B;

/// `0xC3` keeps `prev_c3` alive for this many decrements (within the
/// last byte).
const PREV_C3_WINDOW: i64 = 2;
/// `0x5B` keeps `recent_5b` alive for this many decrements (within the
/// last 10 bytes).
const RECENT_5B_WINDOW: i64 = 11;

/// Outcome of comparing a section's bytes against a candidate run-time
/// address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    /// The candidate matches, modulo tolerated divergence.
    Match,
    /// The candidate does not match; holds the reason the comparator
    /// gave up, for diagnostics.
    Mismatch(crate::error::CandidateFailure),
}

impl CompareOutcome {
    /// Whether this outcome is a match.
    pub fn is_match(self) -> bool {
        matches!(self, CompareOutcome::Match)
    }
}

/// One step of the byte-by-byte trace, for [`explain_mismatch`].
#[derive(Debug, Clone, Copy)]
pub struct TraceStep {
    /// Offset within the run image.
    pub run_o: i64,
    /// Offset within the pre image.
    pub pre_o: i64,
    /// Byte read from the running image, if mapped.
    pub run: Option<u8>,
    /// Byte read from the pre image.
    pub pre: u8,
}

fn probe_run(target: &dyn TargetMemory, base: u64, i: i64) -> Option<u8> {
    let addr = (base as i64 + i) as u64;
    if target.is_mapped(addr) {
        target.read_u8(addr)
    } else {
        None
    }
}

fn probe_pre(pre: &dyn PreImage, base: u64, i: i64) -> Option<u8> {
    Some(pre.read_u8((base as i64 + i) as u64))
}

/// Compare `size` bytes of `pre_addr` (pre-image) against `run_addr`
/// (running image).
///
/// `bindings` accumulates `Tentative` symbol values learned from
/// relocations along the way; the caller commits or rolls them back
/// based on the overall outcome. This function alone never commits.
#[allow(clippy::too_many_arguments)]
pub fn run_pre_cmp(
    run_addr: u64,
    pre_addr: u64,
    size: u64,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    bindings: &mut HashMap<String, Binding>,
) -> CompareOutcome {
    // Size-zero shortcut: a conservative mismatch. Callers pre-filter
    // size-zero sections as trivially finished before ever reaching
    // here (see `SectionDescriptor::is_trivial`).
    if size == 0 {
        return CompareOutcome::Mismatch(crate::error::CandidateFailure::ByteMismatch { offset: 0 });
    }

    let size = size as i64;
    let mut run_o: i64 = 0;
    let mut pre_o: i64 = 0;
    let mut lenient: i64 = 0;
    let mut prev_c3: i64 = 0;
    let mut recent_5b: i64 = 0;

    while run_o < size && pre_o < size {
        if lenient > 0 {
            lenient -= 1;
        }
        if prev_c3 > 0 {
            prev_c3 -= 1;
        }
        if recent_5b > 0 {
            recent_5b -= 1;
        }

        let run_byte_addr = (run_addr as i64 + run_o) as u64;
        if !target.is_mapped(run_byte_addr) {
            return CompareOutcome::Mismatch(crate::error::CandidateFailure::UnmappedAddress {
                addr: run_byte_addr,
            });
        }
        let run = target.read_u8(run_byte_addr).expect("checked mapped above");
        let pre_byte_addr = (pre_addr as i64 + pre_o) as u64;
        let pre_byte = pre.read_u8(pre_byte_addr);

        if run == pre_byte {
            if let Some(reloc) = relocations.find(pre_byte_addr) {
                match handle_myst_reloc(
                    pre_addr, pre_o, run_addr, run_o, reloc, target, bindings,
                ) {
                    RelocVerdict::Consume { advance } => {
                        pre_o += advance;
                        run_o += advance;
                        run_o += 1;
                        pre_o += 1;
                        continue;
                    }
                    RelocVerdict::Abort(reason) => {
                        return CompareOutcome::Mismatch(abort_to_failure(reason, pre_o));
                    }
                }
            }

            if pre_byte == RET {
                prev_c3 = PREV_C3_WINDOW;
            }
            if pre_byte == POP_EBX {
                recent_5b = RECENT_5B_WINDOW;
            }
            let jl = i64::from(jumplen(pre_byte));
            if jl > 0 {
                lenient = lenient.max(jl + 1);
            }

            if match_nop(|i| probe_run(target, run_addr, i), &mut run_o, &mut pre_o) {
                run_o += 1;
                pre_o += 1;
                continue;
            }
            if match_nop(|i| probe_pre(pre, pre_addr, i), &mut pre_o, &mut run_o) {
                run_o += 1;
                pre_o += 1;
                continue;
            }
            run_o += 1;
            pre_o += 1;
            continue;
        }

        if let Some(reloc) = relocations.find(pre_byte_addr) {
            match handle_myst_reloc(pre_addr, pre_o, run_addr, run_o, reloc, target, bindings) {
                RelocVerdict::Consume { advance } => {
                    pre_o += advance;
                    run_o += advance;
                    run_o += 1;
                    pre_o += 1;
                    continue;
                }
                RelocVerdict::Abort(reason) => {
                    return CompareOutcome::Mismatch(abort_to_failure(reason, pre_o));
                }
            }
        }

        if prev_c3 > 0 && recent_5b > 0 {
            // Past the function epilogue: the rest is unrelated padding.
            return CompareOutcome::Match;
        }

        if match_nop(|i| probe_run(target, run_addr, i), &mut run_o, &mut pre_o) {
            run_o += 1;
            pre_o += 1;
            continue;
        }
        if match_nop(|i| probe_pre(pre, pre_addr, i), &mut pre_o, &mut run_o) {
            run_o += 1;
            pre_o += 1;
            continue;
        }

        let run_jl = i64::from(jumplen(run));
        let pre_jl = i64::from(jumplen(pre_byte));
        if run_jl > 0 && pre_jl > 0 {
            run_o += run_jl;
            pre_o += pre_jl;
            run_o += 1;
            pre_o += 1;
            continue;
        }

        if lenient > 0 {
            run_o += 1;
            pre_o += 1;
            continue;
        }

        return CompareOutcome::Mismatch(crate::error::CandidateFailure::ByteMismatch {
            offset: pre_o as u64,
        });
    }

    CompareOutcome::Match
}

fn abort_to_failure(reason: AbortReason, pre_o: i64) -> crate::error::CandidateFailure {
    match reason {
        AbortReason::Placeholder => {
            crate::error::CandidateFailure::PlaceholderDetected { offset: pre_o as u64 }
        }
        AbortReason::Inconsistent {
            symbol,
            recorded,
            expected,
        } => crate::error::CandidateFailure::InconsistentRelocation {
            symbol,
            recorded,
            expected,
        },
    }
}

/// A byte-by-byte trace of a comparison, for diagnostics. Never
/// influences the match verdict.
pub fn explain_mismatch(
    run_addr: u64,
    pre_addr: u64,
    size: u64,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
) -> Vec<TraceStep> {
    let mut steps = Vec::new();
    for i in 0..size as i64 {
        let run_byte_addr = (run_addr as i64 + i) as u64;
        let pre_byte_addr = (pre_addr as i64 + i) as u64;
        steps.push(TraceStep {
            run_o: i,
            pre_o: i,
            run: if target.is_mapped(run_byte_addr) {
                target.read_u8(run_byte_addr)
            } else {
                None
            },
            pre: pre.read_u8(pre_byte_addr),
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::test_support::MemImage;
    use crate::types::{Relocation, RelocationFlags};

    fn cmp(run: Vec<u8>, pre: Vec<u8>, relocations: RelocationTable) -> CompareOutcome {
        let run_img = MemImage::new(0x2000, run);
        let pre_img = MemImage::new(0x1000, pre.clone());
        let mut bindings = HashMap::new();
        run_pre_cmp(
            0x2000,
            0x1000,
            pre.len() as u64,
            &run_img,
            &pre_img,
            &relocations,
            &mut bindings,
        )
    }

    #[test]
    fn test_identical_bytes_match() {
        let bytes = vec![0x55, 0x48, 0x89, 0xE5, 0xC3];
        let outcome = cmp(bytes.clone(), bytes, RelocationTable::default());
        assert!(outcome.is_match());
    }

    #[test]
    fn test_plain_mismatch_rejected() {
        let pre = vec![0x55, 0x48, 0x89, 0xE5];
        let run = vec![0x90, 0x48, 0x89, 0xE5];
        let outcome = cmp(run, pre, RelocationTable::default());
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_jump_operand_tolerance() {
        // jmp +0 vs jmp with a different target.
        let pre = vec![0xE9, 0x00, 0x00, 0x00, 0x00];
        let run = vec![0xE9, 0x34, 0x12, 0x00, 0x00];
        let outcome = cmp(run, pre, RelocationTable::default());
        assert!(outcome.is_match());
    }

    #[test]
    fn test_epilogue_tail_tolerance() {
        // ... C3 5B 00 00 vs ... C3 5B FF FF.
        let pre = vec![0x01, 0x02, RET, POP_EBX, 0x00, 0x00];
        let run = vec![0x01, 0x02, RET, POP_EBX, 0xFF, 0xFF];
        let outcome = cmp(run, pre, RelocationTable::default());
        assert!(outcome.is_match());
    }

    #[test]
    fn test_nop_padding_tolerance() {
        let pre = vec![0x01, 0x02];
        let run = vec![0x01, 0x90, 0x02];
        // run has an extra NOP inserted; cursors re-synchronize.
        let run_img = MemImage::new(0x2000, run);
        let pre_img = MemImage::new(0x1000, pre.clone());
        let mut bindings = HashMap::new();
        let outcome = run_pre_cmp(
            0x2000,
            0x1000,
            pre.len() as u64,
            &run_img,
            &pre_img,
            &RelocationTable::default(),
            &mut bindings,
        );
        assert!(outcome.is_match());
    }

    #[test]
    fn test_relocation_match_learns_symbol() {
        let pre = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let run = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let reloc = Relocation {
            pre_addr: 0x1002,
            symbol: "sym".into(),
            addend: 0,
            flags: RelocationFlags::empty(),
        };
        let table = RelocationTable::new(vec![reloc]);
        let outcome = cmp(run, pre, table);
        assert!(outcome.is_match());
    }

    #[test]
    fn test_placeholder_sentinel_rejected() {
        let pre = vec![0x00, 0x00, 0x00, 0x00];
        let run = vec![0x77, 0x77, 0x77, 0x77];
        let reloc = Relocation {
            pre_addr: 0x1000,
            symbol: "sym".into(),
            addend: 0,
            flags: RelocationFlags::empty(),
        };
        let table = RelocationTable::new(vec![reloc]);
        let outcome = cmp(run, pre, table);
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_unmapped_run_byte_is_mismatch() {
        let run_img = MemImage::new(0x2000, vec![0x01]); // only 1 byte mapped
        let pre_img = MemImage::new(0x1000, vec![0x01, 0x02]);
        let mut bindings = HashMap::new();
        let outcome = run_pre_cmp(
            0x2000,
            0x1000,
            2,
            &run_img,
            &pre_img,
            &RelocationTable::default(),
            &mut bindings,
        );
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_size_zero_is_conservative_mismatch() {
        let run_img = MemImage::new(0x2000, vec![]);
        let pre_img = MemImage::new(0x1000, vec![]);
        let mut bindings = HashMap::new();
        let outcome = run_pre_cmp(
            0x2000,
            0x1000,
            0,
            &run_img,
            &pre_img,
            &RelocationTable::default(),
            &mut bindings,
        );
        assert!(!outcome.is_match());
    }
}
