//! Instruction-encoding heuristics.
//!
//! Three pure oracles, all x86/x86-64-specific:
//!
//! - [`jumps::jumplen`] — jump/call opcode operand-byte counts.
//! - [`nops::match_nop`] — no-op padding recognition.
//! - epilogue tracking (`0xC3`/`0x5B` co-occurrence) lives in
//!   [`crate::comparator`] directly, since it is threaded through the
//!   comparator's own per-byte loop state rather than being a standalone
//!   function.

pub mod jumps;
pub mod nops;

pub use jumps::jumplen;
pub use nops::match_nop;
