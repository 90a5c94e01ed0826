//! Join multi-sentence AIS messages.
//!
//! Reassembly is bounded to physically adjacent lines: fragment N+1 must be
//! the very next sentence after fragment N, with the same sequence id,
//! fragment count and channel. Anything else in between discards the partial
//! message. No state is kept across unrelated sentences.

use tracing::debug;

use crate::sentence::RawSentence;
use crate::types::Channel;

/// A complete payload ready for de-armoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub payload: String,
    /// Fill bits of the final fragment.
    pub fill_bits: u8,
    pub channel: Channel,
    pub own_vessel: bool,
    pub fragments: u8,
}

impl Assembled {
    fn single(s: RawSentence) -> Self {
        Assembled {
            own_vessel: s.is_own_vessel(),
            payload: s.payload,
            fill_bits: s.fill_bits,
            channel: s.channel,
            fragments: 1,
        }
    }
}

#[derive(Debug)]
struct Partial {
    sequence_id: Option<u8>,
    fragment_count: u8,
    next_fragment: u8,
    channel: Channel,
    own_vessel: bool,
    payload: String,
}

impl Partial {
    fn accepts(&self, s: &RawSentence) -> bool {
        s.fragment_number == self.next_fragment
            && s.fragment_count == self.fragment_count
            && s.sequence_id == self.sequence_id
            && s.channel == self.channel
            && s.is_own_vessel() == self.own_vessel
    }
}

/// Adjacent-fragment reassembly state.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    partial: Option<Partial>,
    /// Partial messages thrown away because the sequence was broken.
    pub discarded: u64,
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while waiting for the next fragment.
    pub fn is_pending(&self) -> bool {
        self.partial.is_some()
    }

    /// Something other than the expected next fragment arrived.
    pub fn interrupt(&mut self) {
        if let Some(p) = self.partial.take() {
            self.discarded += 1;
            debug!(
                sequence_id = ?p.sequence_id,
                received = p.next_fragment - 1,
                expected = p.fragment_count,
                "discarding incomplete multi-sentence message"
            );
        }
    }

    /// Feed one sentence. Returns the full payload once the last fragment
    /// arrives; single-fragment sentences are returned immediately.
    pub fn push(&mut self, s: RawSentence) -> Option<Assembled> {
        let broken = self.partial.as_ref().is_some_and(|p| !p.accepts(&s));
        if broken {
            self.interrupt();
        }

        if !s.is_multipart() {
            return Some(Assembled::single(s));
        }

        match self.partial.take() {
            Some(mut p) => {
                p.payload.push_str(&s.payload);
                if s.fragment_number == p.fragment_count {
                    return Some(Assembled {
                        payload: p.payload,
                        fill_bits: s.fill_bits,
                        channel: p.channel,
                        own_vessel: p.own_vessel,
                        fragments: p.fragment_count,
                    });
                }
                p.next_fragment += 1;
                self.partial = Some(p);
                None
            }
            None if s.fragment_number == 1 => {
                self.partial = Some(Partial {
                    sequence_id: s.sequence_id,
                    fragment_count: s.fragment_count,
                    next_fragment: 2,
                    channel: s.channel,
                    own_vessel: s.is_own_vessel(),
                    payload: s.payload,
                });
                None
            }
            None => {
                // A continuation with nothing to continue
                self.discarded += 1;
                debug!(
                    fragment = s.fragment_number,
                    of = s.fragment_count,
                    "orphan fragment dropped"
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentence::parse_sentence;

    const PART1: &str =
        "!AIVDM,2,1,1,A,55?MbV02;H;s<HtKR20EHE:0@T4@Dn2222222216L961O5Gf0NSQEp6ClRp8,0*1C";
    const PART2: &str = "!AIVDM,2,2,1,A,88888888880,2*25";
    const SINGLE: &str = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";

    fn s(line: &str) -> RawSentence {
        parse_sentence(line).expect("valid sentence")
    }

    #[test]
    fn test_single_passes_through() {
        let mut asm = FragmentAssembler::new();
        let out = asm.push(s(SINGLE)).unwrap();
        assert_eq!(out.fragments, 1);
        assert_eq!(out.payload, "177KQJ5000G?tO`K>RA1wUbN0TKH");
        assert!(!asm.is_pending());
    }

    #[test]
    fn test_two_fragments_join() {
        let mut asm = FragmentAssembler::new();
        assert!(asm.push(s(PART1)).is_none());
        assert!(asm.is_pending());

        let out = asm.push(s(PART2)).unwrap();
        assert_eq!(out.fragments, 2);
        assert_eq!(out.payload.len(), 71);
        assert_eq!(out.fill_bits, 2);
        assert_eq!(out.channel, Channel::A);
        assert!(!asm.is_pending());
        assert_eq!(asm.discarded, 0);
    }

    #[test]
    fn test_interleaved_single_breaks_sequence() {
        let mut asm = FragmentAssembler::new();
        assert!(asm.push(s(PART1)).is_none());
        assert!(asm.push(s(SINGLE)).is_some());
        assert!(asm.push(s(PART2)).is_none());
        assert_eq!(asm.discarded, 2); // broken partial + orphan part 2
    }

    #[test]
    fn test_interrupt_discards_partial() {
        let mut asm = FragmentAssembler::new();
        asm.push(s(PART1));
        asm.interrupt();
        assert!(!asm.is_pending());
        assert!(asm.push(s(PART2)).is_none());
        assert_eq!(asm.discarded, 2);
    }

    #[test]
    fn test_mismatched_sequence_id() {
        let mut asm = FragmentAssembler::new();
        asm.push(s(PART1));
        let other = "!AIVDM,2,2,7,A,88888888880,2*23";
        assert!(asm.push(s(other)).is_none());
        assert!(!asm.is_pending());
    }

    #[test]
    fn test_restart_on_new_first_fragment() {
        let mut asm = FragmentAssembler::new();
        asm.push(s(PART1));
        asm.push(s(PART1));
        assert!(asm.is_pending());
        assert_eq!(asm.discarded, 1);
        assert!(asm.push(s(PART2)).is_some());
    }

    #[test]
    fn test_orphan_second_fragment() {
        let mut asm = FragmentAssembler::new();
        assert!(asm.push(s(PART2)).is_none());
        assert_eq!(asm.discarded, 1);
    }
}
