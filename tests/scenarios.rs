//! Integration tests exercising the round-trip laws and named scenarios.

use runpre_matcher::comparator::{run_pre_cmp, CompareOutcome};
use runpre_matcher::target::{Checkpoint, ModuleEnumerator, NullCheckpoint, PreImage, TargetMemory};
use runpre_matcher::{
    do_helper, Binding, MatcherConfig, ModuleInfo, Relocation, RelocationFlags, RelocationTable,
    SectionDescriptor,
};
use std::collections::HashMap;

/// A flat byte image starting at `base`, standing in for a real process
/// or kernel image in these tests.
struct Image {
    base: u64,
    bytes: Vec<u8>,
}

impl Image {
    fn new(base: u64, bytes: Vec<u8>) -> Self {
        Image { base, bytes }
    }

    fn offset(&self, addr: u64) -> Option<usize> {
        addr.checked_sub(self.base).and_then(|o| {
            let o = o as usize;
            (o < self.bytes.len()).then_some(o)
        })
    }
}

impl TargetMemory for Image {
    fn is_mapped(&self, addr: u64) -> bool {
        self.offset(addr).is_some()
    }

    fn read_u8(&self, addr: u64) -> Option<u8> {
        self.offset(addr).map(|o| self.bytes[o])
    }

    fn read_i32(&self, addr: u64) -> Option<i32> {
        use byteorder::{ByteOrder, LittleEndian};
        let o = self.offset(addr)?;
        if o + 4 > self.bytes.len() {
            return None;
        }
        Some(LittleEndian::read_i32(&self.bytes[o..o + 4]))
    }
}

impl PreImage for Image {
    fn read_u8(&self, addr: u64) -> u8 {
        self.offset(addr)
            .map(|o| self.bytes[o])
            .unwrap_or_else(|| panic!("pre-image read out of range: {addr:#x}"))
    }
}

struct NoModules;
impl ModuleEnumerator for NoModules {
    fn modules(&self) -> Vec<ModuleInfo> {
        vec![]
    }
}

// --- Round-trip laws --------------------------------------------------

#[test]
fn round_trip_relocated_bytes_match() {
    // Pre-image holds a 4-byte placeholder; the run-image holds the
    // symbol's real address with a matching addend baked in.
    let pre = Image::new(0x1000, vec![0x00, 0x00, 0x00, 0x00]);
    let run = Image::new(0x9000, 0x9100u32.to_le_bytes().to_vec());
    let reloc = Relocation {
        pre_addr: 0x1000,
        symbol: "target_sym".into(),
        addend: 0,
        flags: RelocationFlags::empty(),
    };
    let relocations = RelocationTable::new(vec![reloc]);
    let mut bindings: HashMap<String, Binding> = HashMap::new();

    let outcome = run_pre_cmp(0x9000, 0x1000, 4, &run, &pre, &relocations, &mut bindings);
    assert_eq!(outcome, CompareOutcome::Match);
    assert_eq!(bindings["target_sym"], Binding::Tentative(0x9100));
}

#[test]
fn round_trip_nop_padding_matches() {
    let pre = Image::new(0x1000, vec![0x55, 0x90, 0xC3]);
    let run = Image::new(0x9000, vec![0x55, 0x0F, 0x1F, 0x00, 0xC3]);
    let relocations = RelocationTable::default();
    let mut bindings = HashMap::new();
    let outcome = run_pre_cmp(0x9000, 0x1000, 3, &run, &pre, &relocations, &mut bindings);
    assert_eq!(outcome, CompareOutcome::Match);
}

#[test]
fn round_trip_jump_operand_tolerance() {
    let pre = Image::new(0x1000, vec![0xE9, 0x00, 0x00, 0x00, 0x00]);
    let run = Image::new(0x9000, vec![0xE9, 0x34, 0x12, 0x00, 0x00]);
    let relocations = RelocationTable::default();
    let mut bindings = HashMap::new();
    let outcome = run_pre_cmp(0x9000, 0x1000, 5, &run, &pre, &relocations, &mut bindings);
    assert_eq!(outcome, CompareOutcome::Match);
}

#[test]
fn round_trip_placeholder_sentinel_fails() {
    let pre = Image::new(0x1000, vec![0x00, 0x00, 0x00, 0x00]);
    let run = Image::new(0x9000, vec![0x77, 0x77, 0x77, 0x77]);
    let reloc = Relocation {
        pre_addr: 0x1000,
        symbol: "sym".into(),
        addend: 0,
        flags: RelocationFlags::empty(),
    };
    let relocations = RelocationTable::new(vec![reloc]);
    let mut bindings = HashMap::new();
    let outcome = run_pre_cmp(0x9000, 0x1000, 4, &run, &pre, &relocations, &mut bindings);
    assert!(matches!(outcome, CompareOutcome::Mismatch(_)));
}

// --- Named scenarios ----------------------------------------------------

#[test]
fn scenario_trivial_section_needs_no_search() {
    let sections = vec![SectionDescriptor {
        name: "empty".into(),
        pre_addr: 0,
        size: 0,
        sym_addrs: vec![],
    }];
    let pre = Image::new(0, vec![]);
    let target = Image::new(0, vec![]);
    let mut cp = NullCheckpoint;
    let report = do_helper(
        &sections,
        &MatcherConfig::default(),
        &target,
        &pre,
        &RelocationTable::default(),
        &NoModules,
        &mut cp,
    )
    .expect("trivial section always succeeds");
    assert!(report.safety_records.is_empty());
}

#[test]
fn scenario_unique_candidate_matches_at_stage_one() {
    let bytes = vec![0xDE, 0xAD, 0xBE, 0xEF];
    let sections = vec![SectionDescriptor {
        name: "s".into(),
        pre_addr: 0x1000,
        size: 4,
        sym_addrs: vec![0x1000],
    }];
    let pre = Image::new(0x1000, bytes.clone());
    let target = Image::new(0x1000, bytes);
    let mut cp = NullCheckpoint;
    let report = do_helper(
        &sections,
        &MatcherConfig::default(),
        &target,
        &pre,
        &RelocationTable::default(),
        &NoModules,
        &mut cp,
    )
    .unwrap();
    assert_eq!(report.safety_records, vec![runpre_matcher::SafetyRecord {
        run_addr: 0x1000,
        size: 4,
        care: false,
    }]);
    assert_eq!(report.bindings.get("s"), Some(&0x1000));
}

#[test]
fn scenario_ambiguous_candidates_escalate_to_stage_two() {
    let bytes = vec![0x01, 0x02, 0x03, 0x04];
    let sections = vec![SectionDescriptor {
        name: "s".into(),
        pre_addr: 0x1000,
        size: bytes.len() as u64,
        sym_addrs: vec![0x2000, 0x3000],
    }];
    let pre = Image::new(0x1000, bytes.clone());
    // Only the 0x3000 candidate actually holds matching bytes.
    let mut buf = vec![0u8; 0x1000 + bytes.len()];
    buf[0x1000..0x1000 + bytes.len()].copy_from_slice(&bytes);
    let target = Image::new(0x2000, buf);
    let mut cp = NullCheckpoint;
    let report = do_helper(
        &sections,
        &MatcherConfig::default(),
        &target,
        &pre,
        &RelocationTable::default(),
        &NoModules,
        &mut cp,
    )
    .unwrap();
    assert_eq!(report.bindings.get("s"), Some(&0x3000));
}

#[test]
fn scenario_cross_section_learning_narrows_candidates() {
    let a_bytes = vec![0x00, 0x00, 0x00, 0x00];
    let b_bytes = vec![0xAB, 0xCD];

    let sections = vec![
        SectionDescriptor {
            name: "a".into(),
            pre_addr: 0x1000,
            size: 4,
            sym_addrs: vec![0x5000],
        },
        SectionDescriptor {
            name: "b".into(),
            pre_addr: 0x2000,
            size: 2,
            sym_addrs: vec![0x6000, 0x7000],
        },
    ];

    let mut pre_bytes = vec![0u8; 0x2000 + 2 - 0x1000];
    pre_bytes[0..4].copy_from_slice(&a_bytes);
    pre_bytes[0x1000..0x1000 + 2].copy_from_slice(&b_bytes);
    let pre = Image::new(0x1000, pre_bytes);

    let mut target_bytes = vec![0u8; 0x7002 - 0x5000];
    target_bytes[0..4].copy_from_slice(&0x7000u32.to_le_bytes());
    let off = 0x7000 - 0x5000;
    target_bytes[off..off + 2].copy_from_slice(&b_bytes);
    let target = Image::new(0x5000, target_bytes);

    let reloc = Relocation {
        pre_addr: 0x1000,
        symbol: "b".into(),
        addend: 0,
        flags: RelocationFlags::empty(),
    };
    let relocations = RelocationTable::new(vec![reloc]);

    let mut cp = NullCheckpoint;
    let report = do_helper(
        &sections,
        &MatcherConfig::default(),
        &target,
        &pre,
        &relocations,
        &NoModules,
        &mut cp,
    )
    .unwrap();

    assert_eq!(report.bindings.get("a"), Some(&0x5000));
    assert_eq!(report.bindings.get("b"), Some(&0x7000));
}

#[test]
fn scenario_epilogue_tail_tolerates_divergent_trailer() {
    let pre = Image::new(0x1000, vec![0x01, 0x02, 0xC3, 0x5B, 0x00, 0x00]);
    let run = Image::new(0x9000, vec![0x01, 0x02, 0xC3, 0x5B, 0xFF, 0xFF]);
    let relocations = RelocationTable::default();
    let mut bindings = HashMap::new();
    let outcome = run_pre_cmp(0x9000, 0x1000, 6, &run, &pre, &relocations, &mut bindings);
    assert_eq!(outcome, CompareOutcome::Match);
}
