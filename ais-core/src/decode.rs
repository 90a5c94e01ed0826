//! Decode AIS bit buffers into typed messages.
//!
//! Handles the supported message types:
//! - 1, 2, 3: Class A position report
//! - 5:       Static and voyage related data
//! - 18:      Class B position report
//! - 24:      Static data report (part A name, part B identity)
//!
//! Every other type code is unsupported and produces no message.

use crate::bits::BitBuffer;
use crate::layout::{
    Fields, POSITION_A, POSITION_B, STATIC_REPORT_A, STATIC_REPORT_B,
    STATIC_REPORT_B_AUXILIARY, STATIC_VOYAGE,
};
use crate::types::*;

/// Bits needed for type, repeat indicator and MMSI.
pub const HEADER_BITS: usize = 38;

/// Scale for latitude/longitude in 1/10000 minute.
const LATLON_SCALE: f64 = 600_000.0;

/// Message type code from bits 0-5.
pub fn message_type(buf: &BitBuffer) -> Option<u8> {
    buf.uint(0, 5, 6).map(|v| v as u8)
}

/// Decode types 1-3.
pub fn decode_position_a(buf: &BitBuffer) -> PositionReportA {
    let f = Fields::decode(buf, &POSITION_A);
    PositionReportA {
        msg_type: f.uint("type") as u8,
        repeat: f.uint("repeat") as u8,
        mmsi: f.uint("mmsi") as Mmsi,
        status: f.uint("status") as u8,
        turn: f.int("turn") as i8,
        speed_kts: f.uint("speed") as f64 / 10.0,
        accuracy: f.flag("accuracy"),
        lon: f.int("lon") as f64 / LATLON_SCALE,
        lat: f.int("lat") as f64 / LATLON_SCALE,
        course_deg: f.uint("course") as f64 / 10.0,
        heading: f.uint("heading") as u16,
        second: f.uint("second") as u8,
        maneuver: f.uint("maneuver") as u8,
        raim: f.flag("raim"),
        radio: f.uint("radio") as u32,
        truncated: f.truncated(),
    }
}

/// Decode type 18.
pub fn decode_position_b(buf: &BitBuffer) -> PositionReportB {
    let f = Fields::decode(buf, &POSITION_B);
    PositionReportB {
        msg_type: f.uint("type") as u8,
        repeat: f.uint("repeat") as u8,
        mmsi: f.uint("mmsi") as Mmsi,
        speed_kts: f.uint("speed") as f64 / 10.0,
        accuracy: f.flag("accuracy"),
        lon: f.int("lon") as f64 / LATLON_SCALE,
        lat: f.int("lat") as f64 / LATLON_SCALE,
        course_deg: f.uint("course") as f64 / 10.0,
        heading: f.uint("heading") as u16,
        second: f.uint("second") as u8,
        cs_unit: f.flag("cs"),
        display: f.flag("display"),
        dsc: f.flag("dsc"),
        band: f.flag("band"),
        msg22: f.flag("msg22"),
        assigned: f.flag("assigned"),
        raim: f.flag("raim"),
        radio: f.uint("radio") as u32,
        truncated: f.truncated(),
    }
}

/// Decode type 5.
pub fn decode_static_voyage(buf: &BitBuffer) -> StaticVoyageData {
    let f = Fields::decode(buf, &STATIC_VOYAGE);
    StaticVoyageData {
        msg_type: f.uint("type") as u8,
        repeat: f.uint("repeat") as u8,
        mmsi: f.uint("mmsi") as Mmsi,
        ais_version: f.uint("ais_version") as u8,
        imo: f.uint("imo") as u32,
        callsign: f.text("callsign"),
        shipname: f.text("shipname"),
        shiptype: f.uint("shiptype") as u8,
        dimensions: dimensions(&f),
        epfd: f.uint("epfd") as u8,
        eta: Eta {
            month: f.uint("month") as u8,
            day: f.uint("day") as u8,
            hour: f.uint("hour") as u8,
            minute: f.uint("minute") as u8,
        },
        draught_m: f.uint("draught") as f64 / 10.0,
        destination: f.text("destination"),
        dte: f.flag("dte"),
        truncated: f.truncated(),
    }
}

/// Decode type 24. Part numbers 2 and 3 are undefined and rejected.
pub fn decode_static_report(buf: &BitBuffer) -> Result<StaticDataReport> {
    let partno = buf
        .uint(38, 39, 2)
        .ok_or(AisError::PayloadTooShort { bits: buf.len() })?;

    let (f, part) = match partno {
        0 => {
            let f = Fields::decode(buf, &STATIC_REPORT_A);
            let part = StaticDataPart::A(StaticPartA {
                shipname: f.text("shipname"),
            });
            (f, part)
        }
        1 => {
            let mmsi = buf.uint(8, 37, 30).unwrap_or(0) as Mmsi;
            let auxiliary = is_auxiliary_craft(mmsi);
            let layout = if auxiliary {
                &STATIC_REPORT_B_AUXILIARY
            } else {
                &STATIC_REPORT_B
            };
            let f = Fields::decode(buf, layout);
            let part = StaticDataPart::B(StaticPartB {
                shiptype: f.uint("shiptype") as u8,
                vendor_id: f.text("vendorid"),
                model: f.uint("model") as u8,
                serial: f.uint("serial") as u32,
                callsign: f.text("callsign"),
                dimensions: (!auxiliary).then(|| dimensions(&f)),
                mothership_mmsi: auxiliary.then(|| f.uint("mothership_mmsi") as Mmsi),
            });
            (f, part)
        }
        n => {
            return Err(AisError::MalformedPayload(format!(
                "type 24 part number {n} is undefined"
            )))
        }
    };

    Ok(StaticDataReport {
        msg_type: f.uint("type") as u8,
        repeat: f.uint("repeat") as u8,
        mmsi: f.uint("mmsi") as Mmsi,
        part,
        truncated: f.truncated(),
    })
}

fn dimensions(f: &Fields) -> Dimensions {
    Dimensions {
        to_bow: f.uint("to_bow") as u16,
        to_stern: f.uint("to_stern") as u16,
        to_port: f.uint("to_port") as u8,
        to_starboard: f.uint("to_starboard") as u8,
    }
}

/// Decode any bit buffer into the appropriate typed message.
///
/// Routes on the 6-bit type code; unsupported codes return
/// `UnsupportedMessageType`.
pub fn decode(buf: &BitBuffer) -> Result<DecodedMessage> {
    let code = message_type(buf).ok_or(AisError::PayloadTooShort { bits: buf.len() })?;
    let kind = MessageKind::from_code(code).ok_or(AisError::UnsupportedMessageType(code))?;
    if buf.len() < HEADER_BITS {
        return Err(AisError::PayloadTooShort { bits: buf.len() });
    }

    match kind {
        MessageKind::PositionReportA => {
            Ok(DecodedMessage::PositionReportA(decode_position_a(buf)))
        }
        MessageKind::PositionReportB => {
            Ok(DecodedMessage::PositionReportB(decode_position_b(buf)))
        }
        MessageKind::StaticVoyageData => {
            Ok(DecodedMessage::StaticVoyageData(decode_static_voyage(buf)))
        }
        MessageKind::StaticDataReport => {
            decode_static_report(buf).map(DecodedMessage::StaticDataReport)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
