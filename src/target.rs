//! External collaborators.
//!
//! The matcher is deliberately decoupled from *how* the running image's
//! bytes are obtained, and from *how* loaded modules are enumerated —
//! both are out of scope for this crate. This module defines the traits
//! a caller implements to plug the matcher into a real target (a live
//! process, a kernel, a recorded snapshot).
//!
//! The crate carries `#![deny(unsafe_code)]`; these traits are the seam
//! where an embedder's own (possibly unsafe) memory access lives, kept
//! out of this crate entirely.

use crate::types::ModuleInfo;

/// Read access to the running target's memory.
///
/// Every read must be preceded by a successful [`TargetMemory::is_mapped`]
/// check; the comparator and relocation resolver in this crate always do
/// so before calling [`TargetMemory::read_u8`] or [`TargetMemory::read_i32`].
pub trait TargetMemory {
    /// `address_mapped(addr) -> bool`.
    fn is_mapped(&self, addr: u64) -> bool;

    /// Read a single byte. Implementations may assume `is_mapped(addr)`
    /// was already checked by the caller and may panic or return `None`
    /// otherwise; the matcher never calls this without checking first.
    fn read_u8(&self, addr: u64) -> Option<u8>;

    /// Read a little-endian 32-bit immediate, used by the relocation
    /// resolver. Implementations may assume all four covered bytes are
    /// mapped.
    fn read_i32(&self, addr: u64) -> Option<i32>;
}

/// Read access to the trusted pre-image: it is owned by the matcher, so
/// reads are trusted.
///
/// Unlike [`TargetMemory`], there is no mapped-ness check: the pre-image
/// is always fully resident.
pub trait PreImage {
    /// Read a single byte at a pre-image address.
    fn read_u8(&self, addr: u64) -> u8;
}

/// Enumerates currently loaded modules, for brute-force search.
pub trait ModuleEnumerator {
    /// `modules() -> [{name, code_base, code_size, init_base,
    /// init_size}]`.
    fn modules(&self) -> Vec<ModuleInfo>;
}

/// A cooperative checkpoint invoked between candidate tries and between
/// brute-search module scans. Both yielding to a scheduler and
/// cancellation are modeled as plain synchronous callbacks so the
/// library does not depend on any particular async runtime.
pub trait Checkpoint {
    /// Called at each suspension point. Returning `true` requests that
    /// the current match attempt be abandoned as soon as possible.
    fn tick(&mut self) -> bool {
        false
    }
}

/// A checkpoint that never yields control and never cancels, for callers
/// that don't need either (tests, short-lived pre-images).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCheckpoint;

impl Checkpoint for NullCheckpoint {}
