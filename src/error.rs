//! Error types for the run-pre matcher.
//!
//! Fatal driver errors (`UnmatchedSections`, `RestartLimitExceeded`) are
//! surfaced as [`MatchError`]. Per-candidate
//! failures are not fatal — the driver tries the next candidate or the
//! next stage — so they are represented separately by [`CandidateFailure`]
//! for diagnostics and tests, never returned from the public matching
//! entry point.

use thiserror::Error;

/// Primary error type for the run-pre matcher's fixed-point driver.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The fixed point converged (no progress across a full pass) with
    /// sections still unmatched.
    #[error("run-pre: could not match some sections: {remaining:?}")]
    UnmatchedSections {
        /// Names of sections that never found a match.
        remaining: Vec<String>,
    },

    /// The driver exceeded its configured restart bound without
    /// terminating.
    #[error("run-pre: restart limit exceeded ({restarts} restarts)")]
    RestartLimitExceeded {
        /// Number of restart passes attempted.
        restarts: u32,
    },
}

/// Result type alias for matcher operations.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Why a single candidate address failed to match a section.
///
/// These are never propagated as top-level errors — every failure inside
/// the comparator and resolver is converted to a boolean "this candidate
/// failed" — they exist so diagnostics and tests can distinguish *why*
/// without re-parsing a printed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateFailure {
    /// A plain byte mismatch with no tolerated divergence applied.
    ByteMismatch {
        /// Offset within the section where the mismatch occurred.
        offset: u64,
    },
    /// The comparator walked off the end of mapped memory.
    UnmappedAddress {
        /// The run-time address that was not mapped.
        addr: u64,
    },
    /// A relocation's expected value contradicted an already-committed
    /// or already-tentative binding for the same symbol.
    InconsistentRelocation {
        /// Symbol whose value was contradicted.
        symbol: String,
        /// Value already recorded for the symbol.
        recorded: i64,
        /// Value this relocation implied instead.
        expected: i64,
    },
    /// A relocation's immediate in the running image was the
    /// unrelocated placeholder sentinel (`0x77777777`).
    PlaceholderDetected {
        /// Offset within the section where the sentinel was found.
        offset: u64,
    },
}

impl std::fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateFailure::ByteMismatch { offset } => {
                write!(f, "byte mismatch at offset {offset:#x}")
            }
            CandidateFailure::UnmappedAddress { addr } => {
                write!(f, "unmapped address {addr:#x}")
            }
            CandidateFailure::InconsistentRelocation {
                symbol,
                recorded,
                expected,
            } => write!(
                f,
                "relocation mismatch for {symbol}: found {recorded:#x}, expected {expected:#x}"
            ),
            CandidateFailure::PlaceholderDetected { offset } => {
                write!(f, "unrelocated placeholder at offset {offset:#x}")
            }
        }
    }
}
