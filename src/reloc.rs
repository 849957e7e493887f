//! Relocation table and resolver (`handle_myst_reloc`).

use std::collections::HashMap;

use crate::target::TargetMemory;
use crate::types::{Binding, Relocation};

/// The unrelocated-placeholder sentinel: a running image whose relocation
/// was never actually applied reads back as this exact 32-bit pattern.
pub const PLACEHOLDER_SENTINEL: i32 = 0x7777_7777;

/// Relocations for one section, indexed by covered pre-address — lookup
/// is by pre-address.
#[derive(Debug, Clone, Default)]
pub struct RelocationTable {
    by_addr: HashMap<u64, Relocation>,
}

impl RelocationTable {
    /// Build a lookup table from a flat relocation list, indexing each
    /// relocation at every pre-address byte it covers.
    pub fn new(relocations: impl IntoIterator<Item = Relocation>) -> Self {
        let mut by_addr = HashMap::new();
        for reloc in relocations {
            for k in 0..4 {
                by_addr.insert(reloc.pre_addr + k, reloc.clone());
            }
        }
        RelocationTable { by_addr }
    }

    /// Find the relocation covering `pre_addr`, if any (`find_addrmap`).
    pub fn find(&self, pre_addr: u64) -> Option<&Relocation> {
        self.by_addr.get(&pre_addr)
    }
}

/// Outcome of resolving a relocation against the running image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocVerdict {
    /// Bytes are consistent with this relocation; the comparator should
    /// skip past the consumed immediate and continue.
    Consume {
        /// Offset to advance both cursors by, counteracting the
        /// comparator's own unconditional per-byte increment
        /// (`4 - offset - 1`).
        advance: i64,
    },
    /// This candidate must be rejected.
    Abort(AbortReason),
}

/// Why a relocation aborted the current candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The running image still held the unrelocated placeholder.
    Placeholder,
    /// The relocation's expected value contradicted an already-bound
    /// value for the same symbol.
    Inconsistent {
        /// Symbol whose value was contradicted.
        symbol: String,
        /// Value already recorded.
        recorded: i64,
        /// Value this relocation implied instead.
        expected: i64,
    },
}

/// Resolve the relocation covering `pre_addr + pre_o` against the
/// running bytes at `run_addr + run_o`.
///
/// `bindings` is mutated in place: an `Unknown` symbol learns a
/// `Tentative` value (step 6); an existing `Tentative`/`Committed`
/// binding is checked for consistency. The caller (the comparator) is
/// responsible for promoting `Tentative` bindings to `Committed` on
/// overall section-match success, or reverting them to `Unknown` on
/// failure — this function never commits.
pub fn handle_myst_reloc(
    pre_addr: u64,
    pre_o: i64,
    run_addr: u64,
    run_o: i64,
    reloc: &Relocation,
    target: &dyn TargetMemory,
    bindings: &mut HashMap<String, Binding>,
) -> RelocVerdict {
    let offset = (pre_addr as i64 + pre_o) - reloc.pre_addr as i64;
    let run_reloc_addr = (run_addr as i64 + run_o - offset) as u64;
    let run_reloc = target
        .read_i32(run_reloc_addr)
        .expect("relocation immediate must be within mapped memory");

    let advance = 4 - offset - 1;

    // String-literal pools are matched only by reference identity.
    if reloc.symbol.starts_with(".rodata.str") {
        return RelocVerdict::Consume { advance };
    }

    if run_reloc == PLACEHOLDER_SENTINEL {
        return RelocVerdict::Abort(AbortReason::Placeholder);
    }

    let mut expected = run_reloc as i64 - reloc.addend;
    if reloc.flags.contains(crate::types::RelocationFlags::PCREL) {
        expected += run_addr as i64 + run_o - offset;
    }

    let binding = bindings
        .entry(reloc.symbol.clone())
        .or_insert(Binding::Unknown);
    match *binding {
        Binding::Unknown => {
            *binding = Binding::Tentative(expected);
        }
        Binding::Tentative(v) | Binding::Committed(v) => {
            if v != expected {
                return RelocVerdict::Abort(AbortReason::Inconsistent {
                    symbol: reloc.symbol.clone(),
                    recorded: v,
                    expected,
                });
            }
        }
    }

    RelocVerdict::Consume { advance }
}
