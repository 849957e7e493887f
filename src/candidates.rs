//! Candidate enumeration: narrowing a section's possible run-time
//! addresses down to a single one, and brute-force scanning loaded
//! modules when symbol hints alone aren't enough.

use std::collections::HashMap;

use crate::comparator::{run_pre_cmp, CompareOutcome};
use crate::reloc::RelocationTable;
use crate::state::Matcher;
use crate::target::{Checkpoint, ModuleEnumerator, PreImage, TargetMemory};
use crate::types::{Binding, CandidateSet, SectionDescriptor};

/// Seed a candidate set from a section's symbol hints, then narrow it
/// against any already-bound value for the section's own name.
pub fn compute_address(section: &SectionDescriptor, matcher: &Matcher) -> CandidateSet {
    let mut glob: CandidateSet = section.sym_addrs.iter().copied().collect();
    if let Some(bound) = matcher.binding(&section.name).value() {
        let bound = bound as u64;
        if glob.is_empty() {
            glob.insert(bound);
        } else {
            glob.retain(|addr| addr == bound);
        }
    }
    glob
}

/// Scan every byte offset of `[base, base+len)` in `module`, invoking the
/// comparator at each offset, stopping at the first match.
///
/// Returns the matching run-time address, if any. Diagnostics are
/// expected to be silenced by the caller for the duration of the scan.
#[allow(clippy::too_many_arguments)]
fn brute_search_region(
    section: &SectionDescriptor,
    base: u64,
    len: u64,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    checkpoint: &mut dyn Checkpoint,
) -> Option<u64> {
    let mut offset = 0u64;
    while offset < len {
        if checkpoint.tick() {
            return None;
        }
        let candidate = base + offset;
        let mut scratch: HashMap<String, Binding> = HashMap::new();
        let outcome = run_pre_cmp(
            candidate,
            section.pre_addr,
            section.size,
            target,
            pre,
            relocations,
            &mut scratch,
        );
        if outcome == CompareOutcome::Match {
            return Some(candidate);
        }
        offset += 1;
    }
    None
}

/// Brute-force scan every loaded module's code and init regions for a
/// section, excluding this matcher's own modules by name convention.
#[allow(clippy::too_many_arguments)]
pub fn brute_search_all_modules(
    section: &SectionDescriptor,
    modules: &dyn ModuleEnumerator,
    target: &dyn TargetMemory,
    pre: &dyn PreImage,
    relocations: &RelocationTable,
    own_prefix: &str,
    own_suffix: &str,
    checkpoint: &mut dyn Checkpoint,
) -> Option<u64> {
    for module in modules.modules() {
        let is_own_by_prefix = !own_prefix.is_empty() && module.name.starts_with(own_prefix);
        let is_own_by_suffix = !own_suffix.is_empty() && module.name.ends_with(own_suffix);
        if is_own_by_prefix || is_own_by_suffix {
            continue;
        }
        if checkpoint.tick() {
            return None;
        }
        if let Some(addr) = brute_search_region(
            section,
            module.code_base,
            module.code_size,
            target,
            pre,
            relocations,
            checkpoint,
        ) {
            return Some(addr);
        }
        if let Some(addr) = brute_search_region(
            section,
            module.init_base,
            module.init_size,
            target,
            pre,
            relocations,
            checkpoint,
        ) {
            return Some(addr);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::test_support::MemImage;
    use crate::target::NullCheckpoint;
    use crate::types::ModuleInfo;

    struct Modules(Vec<ModuleInfo>);
    impl ModuleEnumerator for Modules {
        fn modules(&self) -> Vec<ModuleInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn test_compute_address_seeds_from_hints() {
        let section = SectionDescriptor {
            name: "s".into(),
            pre_addr: 0,
            size: 4,
            sym_addrs: vec![0x1000, 0x2000],
        };
        let matcher = Matcher::new();
        let glob = compute_address(&section, &matcher);
        assert_eq!(glob.len(), 2);
    }

    #[test]
    fn test_compute_address_narrows_against_binding() {
        let section = SectionDescriptor {
            name: "s".into(),
            pre_addr: 0,
            size: 4,
            sym_addrs: vec![0x1000, 0x2000],
        };
        let mut matcher = Matcher::new();
        matcher.bind_committed("s", 0x2000);
        let glob = compute_address(&section, &matcher);
        assert!(glob.singular());
        assert_eq!(glob.iter().next(), Some(0x2000));
    }

    #[test]
    fn test_brute_search_finds_match_in_module() {
        let section = SectionDescriptor {
            name: "s".into(),
            pre_addr: 0x1000,
            size: 2,
            sym_addrs: vec![],
        };
        let pre = MemImage::new(0x1000, vec![0xAA, 0xBB]);
        // Target has two bytes of noise then the matching sequence.
        let target = MemImage::new(0x9000, vec![0x00, 0x00, 0xAA, 0xBB]);
        let modules = Modules(vec![ModuleInfo {
            name: "victim".into(),
            code_base: 0x9000,
            code_size: 4,
            init_base: 0,
            init_size: 0,
        }]);
        let mut cp = NullCheckpoint;
        let found = brute_search_all_modules(
            &section,
            &modules,
            &target,
            &pre,
            &RelocationTable::default(),
            "",
            "_helper",
            &mut cp,
        );
        assert_eq!(found, Some(0x9002));
    }

    #[test]
    fn test_brute_search_skips_own_modules() {
        let section = SectionDescriptor {
            name: "s".into(),
            pre_addr: 0x1000,
            size: 2,
            sym_addrs: vec![],
        };
        let pre = MemImage::new(0x1000, vec![0xAA, 0xBB]);
        let target = MemImage::new(0x9000, vec![0xAA, 0xBB]);
        let modules = Modules(vec![ModuleInfo {
            name: "patch_helper".into(),
            code_base: 0x9000,
            code_size: 2,
            init_base: 0,
            init_size: 0,
        }]);
        let mut cp = NullCheckpoint;
        let found = brute_search_all_modules(
            &section,
            &modules,
            &target,
            &pre,
            &RelocationTable::default(),
            "",
            "_helper",
            &mut cp,
        );
        assert_eq!(found, None);
    }
}
