//! Shared types, error enum, and decoded message types for ais-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by ais-core.
#[derive(Debug, Error)]
pub enum AisError {
    #[error("malformed sentence: {0}")]
    MalformedSentence(String),
    #[error("invalid armor character {ch:?} at payload offset {offset}")]
    ArmorDecode { ch: char, offset: usize },
    #[error("checksum mismatch: sentence says {expected:02X}, computed {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("payload too short: {bits} bits")]
    PayloadTooShort { bits: usize },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(u8),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AisError>;

// ---------------------------------------------------------------------------
// Message kind metadata
// ---------------------------------------------------------------------------

/// The closed set of message kinds this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    PositionReportA,
    PositionReportB,
    StaticVoyageData,
    StaticDataReport,
}

/// Metadata for a supported message type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    pub kind: MessageKind,
    pub name: &'static str,
    pub bits: usize,
}

/// Supported message type table.
pub const KIND_TABLE: &[(u8, KindInfo)] = &[
    (
        1,
        KindInfo {
            kind: MessageKind::PositionReportA,
            name: "Position report class A (scheduled)",
            bits: 168,
        },
    ),
    (
        2,
        KindInfo {
            kind: MessageKind::PositionReportA,
            name: "Position report class A (assigned)",
            bits: 168,
        },
    ),
    (
        3,
        KindInfo {
            kind: MessageKind::PositionReportA,
            name: "Position report class A (interrogated)",
            bits: 168,
        },
    ),
    (
        5,
        KindInfo {
            kind: MessageKind::StaticVoyageData,
            name: "Static and voyage related data",
            bits: 424,
        },
    ),
    (
        18,
        KindInfo {
            kind: MessageKind::PositionReportB,
            name: "Standard class B position report",
            bits: 168,
        },
    ),
    (
        24,
        KindInfo {
            kind: MessageKind::StaticDataReport,
            name: "Static data report",
            bits: 168,
        },
    ),
];

/// Look up message type metadata. Returns `None` for unsupported codes.
pub fn kind_info(code: u8) -> Option<&'static KindInfo> {
    KIND_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, info)| info)
}

impl MessageKind {
    /// Route a type code to its kind. `None` for anything outside the table.
    pub fn from_code(code: u8) -> Option<MessageKind> {
        kind_info(code).map(|info| info.kind)
    }

    /// Position-bearing kinds (as opposed to identity/static data).
    pub fn is_position(&self) -> bool {
        matches!(
            self,
            MessageKind::PositionReportA | MessageKind::PositionReportB
        )
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::PositionReportA => write!(f, "position-a"),
            MessageKind::PositionReportB => write!(f, "position-b"),
            MessageKind::StaticVoyageData => write!(f, "static-voyage"),
            MessageKind::StaticDataReport => write!(f, "static-report"),
        }
    }
}

// ---------------------------------------------------------------------------
// MMSI helpers
// ---------------------------------------------------------------------------

/// Maritime Mobile Service Identity, 30 bits on the wire.
pub type Mmsi = u32;

/// Format an MMSI as the conventional 9-digit string.
pub fn mmsi_to_string(mmsi: Mmsi) -> String {
    format!("{mmsi:09}")
}

/// Parse a 9-digit MMSI string.
pub fn mmsi_from_str(s: &str) -> Option<Mmsi> {
    let s = s.trim();
    if s.is_empty() || s.len() > 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Auxiliary craft associated with a parent ship use MMSIs of the form
/// 98XXXYYYY.
pub fn is_auxiliary_craft(mmsi: Mmsi) -> bool {
    mmsi / 10_000_000 == 98
}

// ---------------------------------------------------------------------------
// Radio channel
// ---------------------------------------------------------------------------

/// VHF channel the sentence was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Channel {
    A,
    B,
    /// Anything other than A/B (some receivers emit 1/2).
    Other(char),
    /// Channel field left empty.
    #[default]
    Unknown,
}

impl Channel {
    pub fn from_field(field: &str) -> Channel {
        let mut chars = field.trim().chars();
        match (chars.next(), chars.next()) {
            (None, _) => Channel::Unknown,
            (Some('A'), None) | (Some('1'), None) => Channel::A,
            (Some('B'), None) | (Some('2'), None) => Channel::B,
            (Some(c), _) => Channel::Other(c),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::A => write!(f, "A"),
            Channel::B => write!(f, "B"),
            Channel::Other(c) => write!(f, "{c}"),
            Channel::Unknown => write!(f, "-"),
        }
    }
}

// ---------------------------------------------------------------------------
// "Not available" sentinels
// ---------------------------------------------------------------------------

pub const LON_NOT_AVAILABLE: f64 = 181.0;
pub const LAT_NOT_AVAILABLE: f64 = 91.0;
pub const SPEED_NOT_AVAILABLE: u16 = 1023;
pub const COURSE_NOT_AVAILABLE: u16 = 3600;
pub const HEADING_NOT_AVAILABLE: u16 = 511;
pub const SECOND_NOT_AVAILABLE: u8 = 60;

fn position_available(lat: f64, lon: f64) -> bool {
    lat.abs() <= 90.0 && lon.abs() <= 180.0
}

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// Types 1, 2, 3: Class A position report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReportA {
    pub msg_type: u8,
    pub repeat: u8,
    pub mmsi: Mmsi,
    pub status: u8,
    /// Raw rate-of-turn indicator, -128 means not available.
    pub turn: i8,
    pub speed_kts: f64,
    pub accuracy: bool,
    pub lon: f64,
    pub lat: f64,
    pub course_deg: f64,
    pub heading: u16,
    pub second: u8,
    pub maneuver: u8,
    pub raim: bool,
    pub radio: u32,
    /// Fields that fell past the end of a short payload (decoded as zero).
    pub truncated: Vec<&'static str>,
}

impl PositionReportA {
    pub fn has_position(&self) -> bool {
        !self.truncated.iter().any(|f| *f == "lat" || *f == "lon")
            && position_available(self.lat, self.lon)
    }

    pub fn speed(&self) -> Option<f64> {
        available_tenths(self.speed_kts, SPEED_NOT_AVAILABLE)
    }

    pub fn course(&self) -> Option<f64> {
        available_tenths(self.course_deg, COURSE_NOT_AVAILABLE)
    }

    pub fn true_heading(&self) -> Option<u16> {
        (self.heading != HEADING_NOT_AVAILABLE).then_some(self.heading)
    }

    /// UTC second of the fix. 60 and above flag a missing or degraded timestamp.
    pub fn utc_second(&self) -> Option<u8> {
        (self.second < SECOND_NOT_AVAILABLE).then_some(self.second)
    }
}

/// Type 18: Class B position report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReportB {
    pub msg_type: u8,
    pub repeat: u8,
    pub mmsi: Mmsi,
    pub speed_kts: f64,
    pub accuracy: bool,
    pub lon: f64,
    pub lat: f64,
    pub course_deg: f64,
    pub heading: u16,
    pub second: u8,
    /// Carrier-sense unit (true) vs SOTDMA unit (false).
    pub cs_unit: bool,
    pub display: bool,
    pub dsc: bool,
    pub band: bool,
    pub msg22: bool,
    pub assigned: bool,
    pub raim: bool,
    pub radio: u32,
    pub truncated: Vec<&'static str>,
}

impl PositionReportB {
    pub fn has_position(&self) -> bool {
        !self.truncated.iter().any(|f| *f == "lat" || *f == "lon")
            && position_available(self.lat, self.lon)
    }

    pub fn speed(&self) -> Option<f64> {
        available_tenths(self.speed_kts, SPEED_NOT_AVAILABLE)
    }

    pub fn course(&self) -> Option<f64> {
        available_tenths(self.course_deg, COURSE_NOT_AVAILABLE)
    }

    pub fn true_heading(&self) -> Option<u16> {
        (self.heading != HEADING_NOT_AVAILABLE).then_some(self.heading)
    }

    /// UTC second of the fix. 60 and above flag a missing or degraded timestamp.
    pub fn utc_second(&self) -> Option<u8> {
        (self.second < SECOND_NOT_AVAILABLE).then_some(self.second)
    }
}

fn available_tenths(value: f64, sentinel: u16) -> Option<f64> {
    if (value * 10.0).round() as u16 == sentinel {
        None
    } else {
        Some(value)
    }
}

/// Hull dimensions relative to the position reference point, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub to_bow: u16,
    pub to_stern: u16,
    pub to_port: u8,
    pub to_starboard: u8,
}

impl Dimensions {
    pub fn length(&self) -> u16 {
        self.to_bow + self.to_stern
    }

    pub fn beam(&self) -> u16 {
        u16::from(self.to_port) + u16::from(self.to_starboard)
    }
}

/// Estimated time of arrival as transmitted (no year, UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Eta {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

/// Type 5: static and voyage related data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticVoyageData {
    pub msg_type: u8,
    pub repeat: u8,
    pub mmsi: Mmsi,
    pub ais_version: u8,
    pub imo: u32,
    pub callsign: String,
    pub shipname: String,
    pub shiptype: u8,
    pub dimensions: Dimensions,
    pub epfd: u8,
    pub eta: Eta,
    pub draught_m: f64,
    pub destination: String,
    pub dte: bool,
    pub truncated: Vec<&'static str>,
}

/// Type 24 part A: vessel name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticPartA {
    pub shipname: String,
}

/// Type 24 part B: type, vendor, call sign, and either hull dimensions or
/// the parent ship's MMSI (auxiliary craft only).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticPartB {
    pub shiptype: u8,
    pub vendor_id: String,
    pub model: u8,
    pub serial: u32,
    pub callsign: String,
    pub dimensions: Option<Dimensions>,
    pub mothership_mmsi: Option<Mmsi>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "part")]
pub enum StaticDataPart {
    A(StaticPartA),
    B(StaticPartB),
}

/// Type 24: static data report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticDataReport {
    pub msg_type: u8,
    pub repeat: u8,
    pub mmsi: Mmsi,
    pub part: StaticDataPart,
    pub truncated: Vec<&'static str>,
}

/// Union type for all decoded messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum DecodedMessage {
    PositionReportA(PositionReportA),
    PositionReportB(PositionReportB),
    StaticVoyageData(StaticVoyageData),
    StaticDataReport(StaticDataReport),
}

impl DecodedMessage {
    /// Get the MMSI from any message type.
    pub fn mmsi(&self) -> Mmsi {
        match self {
            DecodedMessage::PositionReportA(m) => m.mmsi,
            DecodedMessage::PositionReportB(m) => m.mmsi,
            DecodedMessage::StaticVoyageData(m) => m.mmsi,
            DecodedMessage::StaticDataReport(m) => m.mmsi,
        }
    }

    /// Wire type code (1-3, 5, 18, 24).
    pub fn msg_type(&self) -> u8 {
        match self {
            DecodedMessage::PositionReportA(m) => m.msg_type,
            DecodedMessage::PositionReportB(m) => m.msg_type,
            DecodedMessage::StaticVoyageData(m) => m.msg_type,
            DecodedMessage::StaticDataReport(m) => m.msg_type,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            DecodedMessage::PositionReportA(_) => MessageKind::PositionReportA,
            DecodedMessage::PositionReportB(_) => MessageKind::PositionReportB,
            DecodedMessage::StaticVoyageData(_) => MessageKind::StaticVoyageData,
            DecodedMessage::StaticDataReport(_) => MessageKind::StaticDataReport,
        }
    }

    /// Fields that could not be read because the payload was short.
    pub fn truncated(&self) -> &[&'static str] {
        match self {
            DecodedMessage::PositionReportA(m) => &m.truncated,
            DecodedMessage::PositionReportB(m) => &m.truncated,
            DecodedMessage::StaticVoyageData(m) => &m.truncated,
            DecodedMessage::StaticDataReport(m) => &m.truncated,
        }
    }

    /// Latitude/longitude in degrees when the message carries a usable fix.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            DecodedMessage::PositionReportA(m) if m.has_position() => Some((m.lat, m.lon)),
            DecodedMessage::PositionReportB(m) if m.has_position() => Some((m.lat, m.lon)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
