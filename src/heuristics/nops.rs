//! No-op padding recognizer (`match_nop`).
//!
//! The table holds the canonical Intel/gcc multi-byte NOP encodings,
//! ordered longest-first so a long padding run is preferred over a
//! prefix of it matching a shorter entry.

/// Canonical x86 NOP sequences, shortest to longest.
const NOPS: &[&[u8]] = &[
    &[0x90],
    &[0x66, 0x90],
    &[0x0F, 0x1F, 0x00],
    &[0x0F, 0x1F, 0x40, 0x00],
    &[0x0F, 0x1F, 0x44, 0x00, 0x00],
    &[0x66, 0x0F, 0x1F, 0x44, 0x00, 0x00],
    &[0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00],
    &[0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
    &[0x66, 0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
];

/// Probes for a no-op sequence starting at the cursor `*o`, reading
/// bytes through `probe` (which returns `None` for an unreadable byte,
/// so each probed byte is validated, failing silently on unmapped
/// addresses).
///
/// On a match, advances `*o` by `length - 1` and decrements `*other_o` by
/// one, since the comparator's own loop will advance both cursors by one
/// again on this iteration. Tries the longest sequence first.
pub fn match_nop(probe: impl Fn(i64) -> Option<u8>, o: &mut i64, other_o: &mut i64) -> bool {
    for seq in NOPS.iter().rev() {
        let matched = seq
            .iter()
            .enumerate()
            .all(|(j, &expected)| probe(*o + j as i64) == Some(expected));
        if matched {
            *o += (seq.len() - 1) as i64;
            *other_o -= 1;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_nop() {
        let bytes = [0x90u8, 0xAA];
        let mut o = 0i64;
        let mut other_o = 10i64;
        assert!(match_nop(|i| bytes.get(i as usize).copied(), &mut o, &mut other_o));
        assert_eq!(o, 0); // length 1 - 1 == 0
        assert_eq!(other_o, 9);
    }

    #[test]
    fn test_prefers_longest_match() {
        // 0F 1F 00 is a valid 3-byte NOP; also a prefix match of nothing
        // longer here, so it should consume all 3 bytes.
        let bytes = [0x0F, 0x1F, 0x00, 0xAA];
        let mut o = 0i64;
        let mut other_o = 0i64;
        assert!(match_nop(|i| bytes.get(i as usize).copied(), &mut o, &mut other_o));
        assert_eq!(o, 2);
        assert_eq!(other_o, -1);
    }

    #[test]
    fn test_no_match() {
        let bytes = [0xAAu8, 0xBB];
        let mut o = 0i64;
        let mut other_o = 0i64;
        assert!(!match_nop(|i| bytes.get(i as usize).copied(), &mut o, &mut other_o));
        assert_eq!(o, 0);
        assert_eq!(other_o, 0);
    }

    #[test]
    fn test_unmapped_byte_fails_silently() {
        let mut o = 0i64;
        let mut other_o = 0i64;
        assert!(!match_nop(|_| None, &mut o, &mut other_o));
    }
}
