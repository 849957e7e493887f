//! Provisional state management for a single matcher run.
//!
//! Owns the symbol-binding table and safety-record list that `helper.c`
//! keeps as module-level globals (`reloc_namevals`, `safety_records`),
//! plus the commit/rollback operations the original calls
//! `set_temp_myst_relocs(VAL)` / `set_temp_myst_relocs(NOVAL)`.

use std::collections::HashMap;

use crate::types::{Binding, MatchReport, SafetyRecord};

/// Owned matcher state: symbol bindings and accumulated safety records.
///
/// A fresh or [`Matcher::clear`]ed instance has empty bindings and
/// records: at entry and after clean teardown, symbol bindings and
/// safety records are empty.
#[derive(Debug, Default)]
pub struct Matcher {
    bindings: HashMap<String, Binding>,
    safety_records: Vec<SafetyRecord>,
}

impl Matcher {
    /// A fresh matcher with no bindings or safety records.
    pub fn new() -> Self {
        Matcher::default()
    }

    /// Seed a symbol binding, e.g. from externally-supplied initial
    /// values (usually all `Unknown`).
    pub fn seed_binding(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Current state of a symbol binding (`Unknown` if never seen).
    pub fn binding(&self, name: &str) -> Binding {
        self.bindings.get(name).copied().unwrap_or(Binding::Unknown)
    }

    /// Mutable access to the binding table, for the comparator and
    /// relocation resolver to thread through a single section-match
    /// attempt.
    pub(crate) fn bindings_mut(&mut self) -> &mut HashMap<String, Binding> {
        &mut self.bindings
    }

    /// Promote every `Tentative` binding to `Committed`
    /// (`set_temp_myst_relocs(VAL)`), called once a section's match
    /// succeeds.
    ///
    /// Invariant preserved: a binding that was already `Committed` is
    /// left untouched — once a name is committed, its value is immutable
    /// for the remainder of the run.
    pub fn commit_section(&mut self) {
        for binding in self.bindings.values_mut() {
            if let Binding::Tentative(v) = *binding {
                *binding = Binding::Committed(v);
            }
        }
    }

    /// Revert every `Tentative` binding to `Unknown`
    /// (`set_temp_myst_relocs(NOVAL)`), called when a section's match
    /// attempt fails.
    ///
    /// Safety records are not touched here: `try_addr`'s own attempt
    /// only appends a record once the comparator has already returned a
    /// match, so there is never a record to roll back from a failed
    /// attempt (see DESIGN.md).
    pub fn rollback_section(&mut self) {
        self.bindings.retain(|_, binding| !matches!(binding, Binding::Tentative(_)));
    }

    /// Bind `name` directly to a committed run-time address
    /// (`create_nameval`), overwriting any prior
    /// non-committed state. Used when a section match should also make
    /// its own name available as a symbol for future candidate
    /// narrowing.
    pub fn bind_committed(&mut self, name: impl Into<String>, value: i64) {
        self.bindings.insert(name.into(), Binding::Committed(value));
    }

    /// Record a confirmed section match (`try_addr`).
    pub fn record_safety(&mut self, run_addr: u64, size: u64) {
        self.safety_records.push(SafetyRecord {
            run_addr,
            size,
            care: false,
        });
    }

    /// All safety records recorded so far, in match order.
    pub fn safety_records(&self) -> &[SafetyRecord] {
        &self.safety_records
    }

    /// Whether no bindings or safety records remain — the state a fresh
    /// matcher starts in and a cleanly torn-down one returns to.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.safety_records.is_empty()
    }

    /// Release all state (`release_list` on each global in
    /// `cleanup_module`).
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.safety_records.clear();
    }

    /// Consume this matcher into a [`MatchReport`] of committed
    /// bindings and safety records, for the caller to act on once
    /// matching has finished successfully.
    pub fn into_report(self) -> MatchReport {
        let bindings = self
            .bindings
            .into_iter()
            .filter_map(|(name, binding)| binding.value().map(|v| (name, v)))
            .collect();
        MatchReport {
            bindings,
            safety_records: self.safety_records,
        }
    }
}
