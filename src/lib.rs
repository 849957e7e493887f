//! run-pre matcher — finds the run-time addresses of known pre-patch
//! code sections inside a live image.
//!
//! This crate implements the fixed-point search ksplice-style hot
//! patching relies on: given a set of sections as they appeared in the
//! pre-patch build, and read access to a running image that may differ
//! from that build by relocations, alignment NOPs, jump-operand
//! encoding, and compiler epilogue variation, find where each section
//! now lives.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use runpre_matcher::{do_helper, MatcherConfig, SectionDescriptor};
//! use runpre_matcher::target::{NullCheckpoint, PreImage, TargetMemory, ModuleEnumerator};
//! # struct MyTarget; struct MyPre; struct MyMods;
//! # impl TargetMemory for MyTarget {
//! #     fn is_mapped(&self, _: u64) -> bool { false }
//! #     fn read_u8(&self, _: u64) -> Option<u8> { None }
//! #     fn read_i32(&self, _: u64) -> Option<i32> { None }
//! # }
//! # impl PreImage for MyPre { fn read_u8(&self, _: u64) -> u8 { 0 } }
//! # impl ModuleEnumerator for MyMods { fn modules(&self) -> Vec<runpre_matcher::ModuleInfo> { vec![] } }
//!
//! let sections: Vec<SectionDescriptor> = vec![];
//! let relocations = runpre_matcher::RelocationTable::default();
//! let target = MyTarget;
//! let pre = MyPre;
//! let modules = MyMods;
//! let mut checkpoint = NullCheckpoint;
//!
//! let report = do_helper(
//!     &sections,
//!     &MatcherConfig::default(),
//!     &target,
//!     &pre,
//!     &relocations,
//!     &modules,
//!     &mut checkpoint,
//! );
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod candidates;
pub mod comparator;
pub mod config;
pub mod driver;
pub mod error;
pub mod formatter;
pub mod heuristics;
pub mod reloc;
pub mod state;
pub mod target;
pub mod types;

pub use config::{DebugLevel, MatcherConfig};
pub use driver::do_helper;
pub use error::{MatchError, Result};
pub use reloc::RelocationTable;
pub use types::{
    Binding, CandidateSet, MatchReport, ModuleInfo, Relocation, RelocationFlags, SafetyRecord,
    SectionDescriptor, Stage,
};
