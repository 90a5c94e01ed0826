//! Line-in, record-out decode pipeline.
//!
//! One `Pipeline` per input stream. Each call to `process_line` runs the full
//! chain (filter, sentence parse, fragment assembly, de-armor, dispatch,
//! emit) and folds every failure into a `LineOutcome` plus a counter, so a
//! bad line never stops the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::armor::decode_payload;
use crate::assembler::FragmentAssembler;
use crate::decode::decode;
use crate::emitter::{Emitter, KnownStations, RecordSink, StationDirectory, StationRecord};
use crate::sentence::{is_ais_line, parse_sentence};
use crate::types::*;

// ---------------------------------------------------------------------------
// Decode switch
// ---------------------------------------------------------------------------

/// Shared on/off switch for a pipeline.
///
/// Created with the pipeline; clones can be handed to whatever needs to pause
/// decoding (e.g. a bulk synchronization) without touching the pipeline.
#[derive(Debug, Clone)]
pub struct DecodeSwitch(Arc<AtomicBool>);

impl DecodeSwitch {
    fn new(enabled: bool) -> Self {
        DecodeSwitch(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Options and counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Drop sentences whose NMEA checksum does not match.
    pub verify_checksum: bool,
    pub clock_offset_ms: i64,
    /// Initial state of the decode switch.
    pub enabled: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            verify_checksum: false,
            clock_offset_ms: 0,
            enabled: true,
        }
    }
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines: u64,
    /// Lines without an AIVDM/AIVDO sentence.
    pub ignored: u64,
    /// Lines seen while the switch was off.
    pub disabled: u64,
    pub malformed: u64,
    pub armor_failures: u64,
    /// Checksum mismatches, whether or not they were dropped.
    pub checksum_mismatches: u64,
    /// Mismatches dropped because verification is on.
    pub checksum_rejected: u64,
    pub unsupported: u64,
    pub bad_payloads: u64,
    /// Fragments that did not complete a message.
    pub pending: u64,
    pub fragments_discarded: u64,
    pub decoded: u64,
    /// Decoded records with at least one truncated field.
    pub truncated: u64,
    pub position_a: u64,
    pub position_b: u64,
    pub static_voyage: u64,
    pub static_report: u64,
}

impl PipelineStats {
    fn count_kind(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::PositionReportA => self.position_a += 1,
            MessageKind::PositionReportB => self.position_b += 1,
            MessageKind::StaticVoyageData => self.static_voyage += 1,
            MessageKind::StaticDataReport => self.static_report += 1,
        }
    }

    /// AIS lines rejected as invalid.
    pub fn dropped(&self) -> u64 {
        self.malformed + self.checksum_rejected + self.armor_failures + self.bad_payloads
    }
}

/// What happened to one input line.
#[derive(Debug)]
pub enum LineOutcome {
    /// Not an AIS sentence.
    Ignored,
    /// Decoding is switched off.
    Disabled,
    /// Fragment stored, waiting for the rest of the message.
    Pending,
    /// Sentence or payload rejected.
    Dropped(AisError),
    /// Valid payload of a type this crate does not decode.
    Unsupported(u8),
    Record(StationRecord),
}

impl LineOutcome {
    pub fn record(self) -> Option<StationRecord> {
        match self {
            LineOutcome::Record(r) => Some(r),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<D = KnownStations> {
    switch: DecodeSwitch,
    verify_checksum: bool,
    assembler: FragmentAssembler,
    emitter: Emitter<D>,
    stats: PipelineStats,
}

impl<D: StationDirectory> Pipeline<D> {
    pub fn new(directory: D, options: PipelineOptions) -> Self {
        Pipeline {
            switch: DecodeSwitch::new(options.enabled),
            verify_checksum: options.verify_checksum,
            assembler: FragmentAssembler::new(),
            emitter: Emitter::new(directory, options.clock_offset_ms),
            stats: PipelineStats::default(),
        }
    }

    /// Handle for pausing and resuming this pipeline.
    pub fn switch(&self) -> DecodeSwitch {
        self.switch.clone()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn emitter(&self) -> &Emitter<D> {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter<D> {
        &mut self.emitter
    }

    /// Run one line through the pipeline.
    pub fn process_line(&mut self, line: &str, arrival_ms: i64) -> LineOutcome {
        self.stats.lines += 1;
        let outcome = self.route_line(line, arrival_ms);
        self.stats.fragments_discarded = self.assembler.discarded;
        outcome
    }

    /// Run one line and hand any record to `sink`.
    pub fn feed<S: RecordSink>(
        &mut self,
        line: &str,
        arrival_ms: i64,
        sink: &mut S,
    ) -> std::result::Result<LineOutcome, S::Error> {
        match self.process_line(line, arrival_ms) {
            LineOutcome::Record(record) => {
                sink.write(record.clone())?;
                Ok(LineOutcome::Record(record))
            }
            other => Ok(other),
        }
    }

    fn route_line(&mut self, line: &str, arrival_ms: i64) -> LineOutcome {
        if !self.switch.is_enabled() {
            self.stats.disabled += 1;
            self.assembler.interrupt();
            return LineOutcome::Disabled;
        }

        if !is_ais_line(line) {
            self.stats.ignored += 1;
            self.assembler.interrupt();
            return LineOutcome::Ignored;
        }

        self.decode_line(line, arrival_ms)
    }

    fn decode_line(&mut self, line: &str, arrival_ms: i64) -> LineOutcome {
        let sentence = match parse_sentence(line) {
            Ok(s) => s,
            Err(e) => {
                self.stats.malformed += 1;
                self.assembler.interrupt();
                debug!(error = %e, line, "malformed sentence");
                return LineOutcome::Dropped(e);
            }
        };

        if !sentence.checksum_ok() {
            self.stats.checksum_mismatches += 1;
            if self.verify_checksum {
                self.stats.checksum_rejected += 1;
                let err = sentence
                    .verify_checksum()
                    .err()
                    .unwrap_or(AisError::MalformedSentence("checksum".into()));
                self.assembler.interrupt();
                debug!(error = %err, line, "checksum rejected");
                return LineOutcome::Dropped(err);
            }
            trace!(line, "checksum mismatch tolerated");
        }

        let assembled = match self.assembler.push(sentence) {
            Some(a) => a,
            None => {
                self.stats.pending += 1;
                return LineOutcome::Pending;
            }
        };

        let bits = match decode_payload(&assembled.payload) {
            Ok(b) => b,
            Err(e) => {
                self.stats.armor_failures += 1;
                debug!(error = %e, "armor decode failed");
                return LineOutcome::Dropped(e);
            }
        };

        match decode(&bits) {
            Ok(message) => {
                self.stats.decoded += 1;
                self.stats.count_kind(message.kind());
                if !message.truncated().is_empty() {
                    self.stats.truncated += 1;
                    debug!(
                        mmsi = message.mmsi(),
                        bits = bits.len(),
                        fields = ?message.truncated(),
                        "short payload, fields zeroed"
                    );
                }
                let record = self.emitter.emit(message, assembled.own_vessel, arrival_ms);
                trace!(mmsi = record.mmsi, kind = %record.kind, "decoded");
                LineOutcome::Record(record)
            }
            Err(AisError::UnsupportedMessageType(code)) => {
                self.stats.unsupported += 1;
                debug!(code, "unsupported message type");
                LineOutcome::Unsupported(code)
            }
            Err(e) => {
                self.stats.bad_payloads += 1;
                debug!(error = %e, "payload rejected");
                LineOutcome::Dropped(e)
            }
        }
    }
}

/// Decode a single self-contained sentence without a pipeline.
/// Convenience for one-off lines (e.g., test vectors).
pub fn decode_sentence(line: &str) -> Result<DecodedMessage> {
    let sentence = parse_sentence(line)?;
    if sentence.is_multipart() {
        return Err(AisError::MalformedSentence(format!(
            "fragment {} of {} cannot be decoded alone",
            sentence.fragment_number, sentence.fragment_count
        )));
    }
    decode(&decode_payload(&sentence.payload)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{MemorySink, StationClass, UpdateKind};

    const POSITION_A: &str = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";
    const POSITION_B: &str = "!AIVDM,1,1,,A,B5NJ;PP005l4ot5Isbl03wsUkP06,0*76";
    const STATIC_A: &str = "!AIVDM,1,1,,A,H42O55i18tMET00000000000000,2*6D";
    const VOYAGE_1: &str =
        "!AIVDM,2,1,1,A,55?MbV02;H;s<HtKR20EHE:0@T4@Dn2222222216L961O5Gf0NSQEp6ClRp8,0*1C";
    const VOYAGE_2: &str = "!AIVDM,2,2,1,A,88888888880,2*25";
    const BAD_CHECKSUM: &str = "!AIVDM,1,1,,A,15M67FC000G?ufbE`FepT@3n00Sa,0*5C";

    fn pipeline() -> Pipeline {
        Pipeline::new(KnownStations::default(), PipelineOptions::default())
    }

    #[test]
    fn test_process_position_report() {
        let mut p = pipeline();
        let record = p.process_line(POSITION_A, 1_000).record().unwrap();
        assert_eq!(record.mmsi, 477_553_000);
        assert_eq!(record.update, UpdateKind::Position);
        assert_eq!(record.class, StationClass::Mobile);
        assert_eq!(p.stats().decoded, 1);
        assert_eq!(p.stats().position_a, 1);
    }

    #[test]
    fn test_process_two_part_voyage_data() {
        let mut p = pipeline();
        assert!(matches!(p.process_line(VOYAGE_1, 1), LineOutcome::Pending));
        assert_eq!(p.stats().pending, 1);
        let record = p.process_line(VOYAGE_2, 2).record().unwrap();
        match record.message {
            DecodedMessage::StaticVoyageData(m) => {
                assert_eq!(m.shipname, "EVER DIADEM");
                assert_eq!(m.destination, "NEW YORK");
                assert!(m.truncated.is_empty());
            }
            other => panic!("expected voyage data, got {other:?}"),
        }
        assert_eq!(record.received_at_ms, 2);
        assert_eq!(p.stats().static_voyage, 1);
    }

    #[test]
    fn test_unrelated_line_breaks_fragments() {
        let mut p = pipeline();
        p.process_line(VOYAGE_1, 1);
        assert!(matches!(
            p.process_line("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47", 2),
            LineOutcome::Ignored
        ));
        assert!(matches!(p.process_line(VOYAGE_2, 3), LineOutcome::Pending));
        assert_eq!(p.stats().fragments_discarded, 2);
        assert_eq!(p.stats().decoded, 0);
    }

    #[test]
    fn test_discard_counted_on_ignored_line() {
        let mut p = pipeline();
        p.process_line(VOYAGE_1, 1);
        assert!(matches!(p.process_line("$GPGGA,1", 2), LineOutcome::Ignored));
        assert_eq!(p.stats().fragments_discarded, 1);
    }

    #[test]
    fn test_discard_counted_when_disabled() {
        let mut p = pipeline();
        p.process_line(VOYAGE_1, 1);
        p.switch().disable();
        assert!(matches!(p.process_line(VOYAGE_2, 2), LineOutcome::Disabled));
        assert_eq!(p.stats().fragments_discarded, 1);
        assert_eq!(p.stats().disabled, 1);
    }

    #[test]
    fn test_malformed_sentence_dropped() {
        let mut p = pipeline();
        let outcome = p.process_line("!AIVDM,1,1,,B", 0);
        assert!(matches!(
            outcome,
            LineOutcome::Dropped(AisError::MalformedSentence(_))
        ));
        assert_eq!(p.stats().malformed, 1);

        // Stream continues
        assert!(p.process_line(POSITION_A, 0).record().is_some());
    }

    #[test]
    fn test_armor_failure_dropped() {
        let mut p = pipeline();
        let outcome = p.process_line("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1w~bN0TKH,0*00", 0);
        assert!(matches!(
            outcome,
            LineOutcome::Dropped(AisError::ArmorDecode { ch: '~', .. })
        ));
        assert_eq!(p.stats().armor_failures, 1);
    }

    #[test]
    fn test_unsupported_type_counted() {
        let mut p = pipeline();
        // Type 4 base station report
        let outcome = p.process_line("!AIVDM,1,1,,A,403OviQuMGCqWrRO9>E6fE700@GO,0*4D", 0);
        assert!(matches!(outcome, LineOutcome::Unsupported(4)));
        assert_eq!(p.stats().unsupported, 1);
        assert_eq!(p.stats().decoded, 0);
    }

    #[test]
    fn test_short_unsupported_type_counted() {
        let mut p = pipeline();
        // 30 bits of a type 4 payload
        let outcome = p.process_line("!AIVDM,1,1,,A,40000,0*00", 0);
        assert!(matches!(outcome, LineOutcome::Unsupported(4)));
        assert_eq!(p.stats().unsupported, 1);
        assert_eq!(p.stats().bad_payloads, 0);
        assert_eq!(p.stats().dropped(), 0);
    }

    #[test]
    fn test_checksum_tolerated_by_default() {
        let mut p = pipeline();
        assert!(p.process_line(BAD_CHECKSUM, 0).record().is_some());
        assert_eq!(p.stats().checksum_mismatches, 1);
    }

    #[test]
    fn test_checksum_enforced_when_enabled() {
        let options = PipelineOptions {
            verify_checksum: true,
            ..PipelineOptions::default()
        };
        let mut p = Pipeline::new(KnownStations::default(), options);
        assert!(matches!(
            p.process_line(BAD_CHECKSUM, 0),
            LineOutcome::Dropped(AisError::ChecksumMismatch { .. })
        ));
        assert_eq!(p.stats().checksum_rejected, 1);
        assert_eq!(p.stats().dropped(), 1);
        assert!(p.process_line(POSITION_A, 0).record().is_some());
    }

    #[test]
    fn test_switch_disables_decoding() {
        let mut p = pipeline();
        let switch = p.switch();
        switch.disable();
        assert!(matches!(p.process_line(POSITION_A, 0), LineOutcome::Disabled));
        assert_eq!(p.stats().disabled, 1);

        switch.enable();
        assert!(p.process_line(POSITION_A, 0).record().is_some());
    }

    #[test]
    fn test_pipeline_starts_disabled() {
        let options = PipelineOptions {
            enabled: false,
            ..PipelineOptions::default()
        };
        let mut p = Pipeline::new(KnownStations::default(), options);
        assert!(!p.switch().is_enabled());
        assert!(matches!(p.process_line(POSITION_A, 0), LineOutcome::Disabled));
    }

    #[test]
    fn test_known_station_classification() {
        let mut p = Pipeline::new(KnownStations::new([367_430_530]), PipelineOptions::default());
        let record = p.process_line(POSITION_B, 0).record().unwrap();
        assert_eq!(record.class, StationClass::Known);
    }

    #[test]
    fn test_feed_writes_to_sink() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        for line in [POSITION_A, "garbage", POSITION_B, VOYAGE_1, VOYAGE_2, STATIC_A] {
            p.feed(line, 7, &mut sink).unwrap();
        }
        assert_eq!(sink.records.len(), 4);
        assert_eq!(p.stats().lines, 6);
        assert_eq!(p.stats().ignored, 1);
        assert_eq!(p.stats().static_report, 1);
    }

    #[test]
    fn test_decode_sentence() {
        let msg = decode_sentence(POSITION_A).unwrap();
        assert_eq!(msg.mmsi(), 477_553_000);
        assert!(decode_sentence(VOYAGE_1).is_err());
        assert!(decode_sentence("!AIVDM,1,1,,B,,0").is_err());
    }
}
