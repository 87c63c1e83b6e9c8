//! Payload and birth/death sequence counters

/// Owns the two Sparkplug sequence counters of a node.
///
/// `payload_seq` wraps 0..=255 and advances once per payload built.
/// `birth_death_seq` is the bdSeq the next NDEATH/NBIRTH pair will carry; it
/// advances only after a connection has been birthed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceAuthority {
    payload_seq: u8,
    birth_death_seq: u32,
}

impl SequenceAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current payload seq and advances it, wrapping 255 -> 0.
    pub fn next_payload_seq(&mut self) -> u8 {
        let seq = self.payload_seq;
        self.payload_seq = self.payload_seq.wrapping_add(1);
        seq
    }

    /// The bdSeq to embed in the death payload armed before the next
    /// connection attempt and in the birth sent once that attempt succeeds.
    pub fn next_birth_death_seq(&self) -> u32 {
        self.birth_death_seq
    }

    /// Called once per successful connection, after the birth is published.
    pub fn advance_birth_death_seq(&mut self) {
        self.birth_death_seq = self.birth_death_seq.wrapping_add(1);
    }

    pub fn peek_payload_seq(&self) -> u8 {
        self.payload_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_seq_wraps() {
        let mut seqs = SequenceAuthority::new();
        for expected in 0..=255u8 {
            assert_eq!(seqs.next_payload_seq(), expected);
        }
        assert_eq!(seqs.next_payload_seq(), 0);
        assert_eq!(seqs.next_payload_seq(), 1);
    }

    #[test]
    fn test_birth_death_seq_only_moves_on_advance() {
        let mut seqs = SequenceAuthority::new();
        assert_eq!(seqs.next_birth_death_seq(), 0);
        assert_eq!(seqs.next_birth_death_seq(), 0);
        seqs.next_payload_seq();
        assert_eq!(seqs.next_birth_death_seq(), 0);

        seqs.advance_birth_death_seq();
        assert_eq!(seqs.next_birth_death_seq(), 1);
        // no wrap at 255, bdSeq is a u32
        for _ in 0..300 {
            seqs.advance_birth_death_seq();
        }
        assert_eq!(seqs.next_birth_death_seq(), 301);
    }
}
