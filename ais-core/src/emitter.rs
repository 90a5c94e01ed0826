//! Hand decoded messages to the persistence layer.
//!
//! Pure logic, no I/O. The emitter classifies each message's MMSI as a known
//! (fixed, configured) station or a mobile one, tags the update as position
//! or identity data, stamps the corrected arrival time and produces a
//! `StationRecord`. Where and how the record is stored is up to the
//! `RecordSink` the caller supplies.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::types::*;

// ---------------------------------------------------------------------------
// Handoff shape
// ---------------------------------------------------------------------------

/// Whether the MMSI belongs to a station the operator already knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StationClass {
    /// Listed in configuration (base stations, AtoNs, own fleet).
    Known,
    /// Anything else; stored as a roaming vessel.
    Mobile,
}

/// What the record updates on the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UpdateKind {
    Position,
    Identity,
}

impl From<MessageKind> for UpdateKind {
    fn from(kind: MessageKind) -> Self {
        if kind.is_position() {
            UpdateKind::Position
        } else {
            UpdateKind::Identity
        }
    }
}

/// One decoded message ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub mmsi: Mmsi,
    pub kind: MessageKind,
    pub class: StationClass,
    pub update: UpdateKind,
    /// Arrival time in milliseconds since the Unix epoch, offset-corrected.
    pub received_at_ms: i64,
    /// Sentence was AIVDO (own vessel).
    pub own_vessel: bool,
    pub message: DecodedMessage,
}

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Lookup of known stations by MMSI.
pub trait StationDirectory {
    fn is_known(&self, mmsi: Mmsi) -> bool;
}

/// Destination for emitted records.
pub trait RecordSink {
    type Error;

    fn write(&mut self, record: StationRecord) -> std::result::Result<(), Self::Error>;
}

/// Fixed set of known MMSIs, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct KnownStations {
    mmsis: HashSet<Mmsi>,
}

impl KnownStations {
    pub fn new<I: IntoIterator<Item = Mmsi>>(mmsis: I) -> Self {
        KnownStations {
            mmsis: mmsis.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, mmsi: Mmsi) -> bool {
        self.mmsis.insert(mmsi)
    }

    pub fn len(&self) -> usize {
        self.mmsis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmsis.is_empty()
    }
}

impl StationDirectory for KnownStations {
    fn is_known(&self, mmsi: Mmsi) -> bool {
        self.mmsis.contains(&mmsi)
    }
}

impl<D: StationDirectory + ?Sized> StationDirectory for &D {
    fn is_known(&self, mmsi: Mmsi) -> bool {
        (**self).is_known(mmsi)
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<StationRecord>,
}

impl RecordSink for MemorySink {
    type Error = std::convert::Infallible;

    fn write(&mut self, record: StationRecord) -> std::result::Result<(), Self::Error> {
        self.records.push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Classifies decoded messages and stamps arrival time.
#[derive(Debug, Clone)]
pub struct Emitter<D> {
    directory: D,
    /// Correction added to every arrival time, supplied by whatever
    /// maintains the time base.
    clock_offset_ms: i64,
}

impl<D: StationDirectory> Emitter<D> {
    pub fn new(directory: D, clock_offset_ms: i64) -> Self {
        Emitter {
            directory,
            clock_offset_ms,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn clock_offset_ms(&self) -> i64 {
        self.clock_offset_ms
    }

    pub fn set_clock_offset_ms(&mut self, offset: i64) {
        self.clock_offset_ms = offset;
    }

    pub fn classify(&self, mmsi: Mmsi) -> StationClass {
        if self.directory.is_known(mmsi) {
            StationClass::Known
        } else {
            StationClass::Mobile
        }
    }

    /// Build the record for one decoded message.
    pub fn emit(
        &self,
        message: DecodedMessage,
        own_vessel: bool,
        arrival_ms: i64,
    ) -> StationRecord {
        let mmsi = message.mmsi();
        let kind = message.kind();
        StationRecord {
            mmsi,
            kind,
            class: self.classify(mmsi),
            update: UpdateKind::from(kind),
            received_at_ms: arrival_ms.saturating_add(self.clock_offset_ms),
            own_vessel,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::armor::decode_payload;
    use crate::decode::decode;

    fn message(payload: &str) -> DecodedMessage {
        decode(&decode_payload(payload).unwrap()).unwrap()
    }

    #[test]
    fn test_update_kind_from_message_kind() {
        assert_eq!(UpdateKind::from(MessageKind::PositionReportA), UpdateKind::Position);
        assert_eq!(UpdateKind::from(MessageKind::PositionReportB), UpdateKind::Position);
        assert_eq!(UpdateKind::from(MessageKind::StaticVoyageData), UpdateKind::Identity);
        assert_eq!(UpdateKind::from(MessageKind::StaticDataReport), UpdateKind::Identity);
    }

    #[test]
    fn test_classify_known_and_mobile() {
        let emitter = Emitter::new(KnownStations::new([477_553_000]), 0);
        assert_eq!(emitter.classify(477_553_000), StationClass::Known);
        assert_eq!(emitter.classify(367_430_530), StationClass::Mobile);
    }

    #[test]
    fn test_emit_position_record() {
        let emitter = Emitter::new(KnownStations::default(), 0);
        let record = emitter.emit(message("177KQJ5000G?tO`K>RA1wUbN0TKH"), false, 1_000);
        assert_eq!(record.mmsi, 477_553_000);
        assert_eq!(record.kind, MessageKind::PositionReportA);
        assert_eq!(record.class, StationClass::Mobile);
        assert_eq!(record.update, UpdateKind::Position);
        assert_eq!(record.received_at_ms, 1_000);
    }

    #[test]
    fn test_emit_identity_record_known() {
        let emitter = Emitter::new(KnownStations::new([271_041_815]), 0);
        let record = emitter.emit(message("H42O55i18tMET00000000000000"), true, 5);
        assert_eq!(record.class, StationClass::Known);
        assert_eq!(record.update, UpdateKind::Identity);
        assert!(record.own_vessel);
    }

    #[test]
    fn test_clock_offset_applied() {
        let mut emitter = Emitter::new(KnownStations::default(), 250);
        let record = emitter.emit(message("B5NJ;PP005l4ot5Isbl03wsUkP06"), false, 10_000);
        assert_eq!(record.received_at_ms, 10_250);

        emitter.set_clock_offset_ms(-500);
        let record = emitter.emit(message("B5NJ;PP005l4ot5Isbl03wsUkP06"), false, 10_000);
        assert_eq!(record.received_at_ms, 9_500);
    }

    #[test]
    fn test_clock_offset_saturates() {
        let mut emitter = Emitter::new(KnownStations::default(), 1_000);
        let record = emitter.emit(message("B5NJ;PP005l4ot5Isbl03wsUkP06"), false, i64::MAX);
        assert_eq!(record.received_at_ms, i64::MAX);

        emitter.set_clock_offset_ms(-1_000);
        let record = emitter.emit(message("B5NJ;PP005l4ot5Isbl03wsUkP06"), false, i64::MIN);
        assert_eq!(record.received_at_ms, i64::MIN);
    }

    #[test]
    fn test_directory_by_reference() {
        let known = KnownStations::new([1, 2, 3]);
        let emitter = Emitter::new(&known, 0);
        assert_eq!(emitter.classify(2), StationClass::Known);
        assert_eq!(known.len(), 3);
    }

    #[test]
    fn test_memory_sink() {
        let emitter = Emitter::new(KnownStations::default(), 0);
        let mut sink = MemorySink::default();
        let record = emitter.emit(message("177KQJ5000G?tO`K>RA1wUbN0TKH"), false, 1);
        sink.write(record.clone()).unwrap();
        assert_eq!(sink.records, vec![record]);
    }

    #[test]
    fn test_now_ms_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_ms() > 1_577_836_800_000);
    }
}
