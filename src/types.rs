//! Core data model for the run-pre matcher.
//!
//! Globals in the original `helper.c` — `reloc_namevals`, `reloc_addrmaps`,
//! `safety_records`, all intrusive linked lists — become owned, explicit
//! types here: global mutable state becomes an owned subsystem, and
//! intrusive linked lists become owned vectors.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A pre-patch section as known to the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDescriptor {
    /// Section name, also used as the symbol name bound on a successful
    /// match (`create_nameval`).
    pub name: String,
    /// Address of this section's bytes in the pre-image.
    pub pre_addr: u64,
    /// Size in bytes. Zero means "trivially matched, nothing to do."
    pub size: u64,
    /// Candidate run-time addresses seeded from symbol hints.
    #[serde(default)]
    pub sym_addrs: Vec<u64>,
}

impl SectionDescriptor {
    /// A section needs no search: the comparator's own `size == 0` path
    /// is a conservative mismatch, so callers must pre-filter zero-size
    /// sections as trivially finished rather than invoking the
    /// comparator on them.
    pub fn is_trivial(&self) -> bool {
        self.size == 0
    }
}

bitflags! {
    /// Relocation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RelocationFlags: u32 {
        /// The relocation's value is relative to the position of the
        /// immediate itself.
        const PCREL = 0b0000_0001;
        /// Informational only: the addend is non-zero. `helper.c` never
        /// inspects this; it exists purely so diagnostics can explain an
        /// `expected` value without recomputing the addend from scratch.
        const NONZERO_ADDEND = 0b0000_0010;
    }
}

/// A single 4-byte relocation within a section's pre-image bytes
/// (`addrmap`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relocation {
    /// Pre-image address at which this relocation's 4-byte immediate
    /// begins.
    pub pre_addr: u64,
    /// Name of the symbol this relocation refers to.
    pub symbol: String,
    /// Addend recorded alongside the relocation.
    pub addend: i64,
    /// Relocation flags.
    #[serde(default)]
    pub flags: RelocationFlags,
}

impl Relocation {
    /// Whether `addr` falls within this relocation's 4-byte immediate.
    pub fn covers(&self, addr: u64) -> bool {
        addr >= self.pre_addr && addr < self.pre_addr + 4
    }
}

/// The state of a symbol binding (`nameval`), reified as a sum type
/// instead of a `{value, status}` pair.
///
/// Invariant: once `Committed`, a binding's value never changes for the
/// remainder of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// `NOVAL`: value is unknown.
    Unknown,
    /// `TEMP`: assigned tentatively during the current section's match
    /// attempt; reverted to `Unknown` on failure, promoted to
    /// `Committed` on success.
    Tentative(i64),
    /// `VAL`: committed, immutable for the rest of the run.
    Committed(i64),
}

impl Binding {
    /// The bound value, if any is currently recorded (tentative or
    /// committed).
    pub fn value(self) -> Option<i64> {
        match self {
            Binding::Unknown => None,
            Binding::Tentative(v) | Binding::Committed(v) => Some(v),
        }
    }

    /// Whether this binding is `Committed`.
    pub fn is_committed(self) -> bool {
        matches!(self, Binding::Committed(_))
    }
}

/// A memory range the downstream patcher must be aware of, recorded on a
/// confirmed section match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyRecord {
    /// Run-time address of the matched section.
    pub run_addr: u64,
    /// Size of the matched section in bytes.
    pub size: u64,
    /// Populated by later phases outside this crate; always `false`
    /// when produced here — its population lives outside the core.
    pub care: bool,
}

/// Search aggressiveness, as named variants instead of magic integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Only commit unique candidates; learn symbol values.
    Unique = 1,
    /// Try every candidate in turn, accepting the first match.
    AnyCandidate = 2,
    /// Additionally brute-force scan every loaded module.
    Brute = 3,
}

impl Stage {
    /// The next more permissive stage, or `None` if already at
    /// [`Stage::Brute`].
    pub fn escalate(self) -> Option<Stage> {
        match self {
            Stage::Unique => Some(Stage::AnyCandidate),
            Stage::AnyCandidate => Some(Stage::Brute),
            Stage::Brute => None,
        }
    }
}

/// An unordered collection of candidate run-time addresses for one
/// section (`glob`).
///
/// Backed by a `Vec` with dedup-on-insert rather than a `HashSet`: the
/// original's `add2glob` preserves first-seen order, which brute search
/// and tests rely on for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    addrs: Vec<u64>,
}

impl CandidateSet {
    /// An empty candidate set.
    pub fn new() -> Self {
        CandidateSet { addrs: Vec::new() }
    }

    /// Insert a candidate address, ignoring duplicates.
    pub fn insert(&mut self, addr: u64) {
        if !self.addrs.contains(&addr) {
            self.addrs.push(addr);
        }
    }

    /// Number of distinct candidates.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Whether there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// `singular(g)`: true iff exactly one candidate remains.
    pub fn singular(&self) -> bool {
        self.addrs.len() == 1
    }

    /// Retain only candidates matching `predicate`, used by
    /// `compute_address`'s narrowing against an already-bound value.
    pub fn retain(&mut self, predicate: impl Fn(u64) -> bool) {
        self.addrs.retain(|&a| predicate(a));
    }

    /// Iterate candidates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.addrs.iter().copied()
    }
}

impl FromIterator<u64> for CandidateSet {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        let mut set = CandidateSet::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}

/// A loaded module, as yielded by the external module enumerator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module name.
    pub name: String,
    /// Base address of the module's code region.
    pub code_base: u64,
    /// Size in bytes of the module's code region.
    pub code_size: u64,
    /// Base address of the module's init region.
    pub init_base: u64,
    /// Size in bytes of the module's init region.
    pub init_size: u64,
}

/// The outcome of a successful matcher run: every section's run-time
/// address, committed symbol bindings, and the accumulated safety
/// records, all handed back by value rather than left in process-wide
/// globals.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Symbol name -> committed run-time address, for every symbol the
    /// matcher learned a value for (not just section names).
    pub bindings: HashMap<String, i64>,
    /// Safety records accumulated across all matched sections, in
    /// match order.
    pub safety_records: Vec<SafetyRecord>,
}
