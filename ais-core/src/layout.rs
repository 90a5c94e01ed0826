//! Declarative bit layouts for each supported message kind.
//!
//! Every field is a named `[start, start + width)` range with an
//! interpretation. `Fields::decode` walks a layout once and the typed
//! constructors in `decode` only apply scales. Spare and reserved bits are
//! not listed.

use crate::bits::BitBuffer;

/// How a bit range is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Signed,
    Flag,
    Text,
}

/// One named field in a message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub start: usize,
    pub width: usize,
    pub kind: FieldKind,
}

impl FieldDef {
    /// Inclusive last bit of the field.
    pub const fn end(&self) -> usize {
        self.start + self.width - 1
    }
}

const fn uint(name: &'static str, start: usize, width: usize) -> FieldDef {
    FieldDef {
        name,
        start,
        width,
        kind: FieldKind::Unsigned,
    }
}

const fn int(name: &'static str, start: usize, width: usize) -> FieldDef {
    FieldDef {
        name,
        start,
        width,
        kind: FieldKind::Signed,
    }
}

const fn flag(name: &'static str, start: usize) -> FieldDef {
    FieldDef {
        name,
        start,
        width: 1,
        kind: FieldKind::Flag,
    }
}

const fn text(name: &'static str, start: usize, width: usize) -> FieldDef {
    FieldDef {
        name,
        start,
        width,
        kind: FieldKind::Text,
    }
}

/// A complete message layout.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    /// Nominal message length in bits.
    pub bits: usize,
    pub fields: &'static [FieldDef],
}

impl Layout {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ---------------------------------------------------------------------------
// Layout tables
// ---------------------------------------------------------------------------

/// Types 1, 2, 3.
pub static POSITION_A: Layout = Layout {
    name: "position-a",
    bits: 168,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("status", 38, 4),
        int("turn", 42, 8),
        uint("speed", 50, 10),
        flag("accuracy", 60),
        int("lon", 61, 28),
        int("lat", 89, 27),
        uint("course", 116, 12),
        uint("heading", 128, 9),
        uint("second", 137, 6),
        uint("maneuver", 143, 2),
        flag("raim", 148),
        uint("radio", 149, 19),
    ],
};

/// Type 18.
pub static POSITION_B: Layout = Layout {
    name: "position-b",
    bits: 168,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("speed", 46, 10),
        flag("accuracy", 56),
        int("lon", 57, 28),
        int("lat", 85, 27),
        uint("course", 112, 12),
        uint("heading", 124, 9),
        uint("second", 133, 6),
        flag("cs", 141),
        flag("display", 142),
        flag("dsc", 143),
        flag("band", 144),
        flag("msg22", 145),
        flag("assigned", 146),
        flag("raim", 147),
        uint("radio", 148, 20),
    ],
};

/// Type 5.
pub static STATIC_VOYAGE: Layout = Layout {
    name: "static-voyage",
    bits: 424,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("ais_version", 38, 2),
        uint("imo", 40, 30),
        text("callsign", 70, 42),
        text("shipname", 112, 120),
        uint("shiptype", 232, 8),
        uint("to_bow", 240, 9),
        uint("to_stern", 249, 9),
        uint("to_port", 258, 6),
        uint("to_starboard", 264, 6),
        uint("epfd", 270, 4),
        uint("month", 274, 4),
        uint("day", 278, 5),
        uint("hour", 283, 5),
        uint("minute", 288, 6),
        uint("draught", 294, 8),
        text("destination", 302, 120),
        flag("dte", 422),
    ],
};

/// Type 24, part A (part number 0).
pub static STATIC_REPORT_A: Layout = Layout {
    name: "static-report-a",
    bits: 168,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("partno", 38, 2),
        text("shipname", 40, 120),
    ],
};

/// Type 24, part B (part number 1) for ordinary vessels.
pub static STATIC_REPORT_B: Layout = Layout {
    name: "static-report-b",
    bits: 168,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("partno", 38, 2),
        uint("shiptype", 40, 8),
        text("vendorid", 48, 18),
        uint("model", 66, 4),
        uint("serial", 70, 20),
        text("callsign", 90, 42),
        uint("to_bow", 132, 9),
        uint("to_stern", 141, 9),
        uint("to_port", 150, 6),
        uint("to_starboard", 156, 6),
    ],
};

/// Type 24, part B for auxiliary craft: the dimension bits carry the
/// parent ship's MMSI instead.
pub static STATIC_REPORT_B_AUXILIARY: Layout = Layout {
    name: "static-report-b-auxiliary",
    bits: 168,
    fields: &[
        uint("type", 0, 6),
        uint("repeat", 6, 2),
        uint("mmsi", 8, 30),
        uint("partno", 38, 2),
        uint("shiptype", 40, 8),
        text("vendorid", 48, 18),
        uint("model", 66, 4),
        uint("serial", 70, 20),
        text("callsign", 90, 42),
        uint("mothership_mmsi", 132, 30),
    ],
};

/// Every layout, for table-wide checks.
pub static LAYOUTS: &[&Layout] = &[
    &POSITION_A,
    &POSITION_B,
    &STATIC_VOYAGE,
    &STATIC_REPORT_A,
    &STATIC_REPORT_B,
    &STATIC_REPORT_B_AUXILIARY,
];

// ---------------------------------------------------------------------------
// Generic field decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Flag(bool),
    Text(String),
}

/// Decoded values of one layout, `None` where the payload was too short.
#[derive(Debug, Clone)]
pub struct Fields {
    layout: &'static Layout,
    values: Vec<Option<FieldValue>>,
}

impl Fields {
    /// Extract every field of `layout` from `buf`.
    pub fn decode(buf: &BitBuffer, layout: &'static Layout) -> Fields {
        let values = layout
            .fields
            .iter()
            .map(|field| {
                let (start, end, span) = (field.start, field.end(), field.width);
                match field.kind {
                    FieldKind::Unsigned => buf.uint(start, end, span).map(FieldValue::Unsigned),
                    FieldKind::Signed => buf.int(start, end, span).map(FieldValue::Signed),
                    FieldKind::Flag => buf.uint(start, end, span).map(|v| FieldValue::Flag(v == 1)),
                    FieldKind::Text => buf.text(start, end, span).map(FieldValue::Text),
                }
            })
            .collect();

        Fields { layout, values }
    }

    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Raw value, `None` if truncated.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let idx = self.layout.fields.iter().position(|f| f.name == name);
        debug_assert!(idx.is_some(), "{} has no field {name}", self.layout.name);
        self.values.get(idx?)?.as_ref()
    }

    /// Unsigned value, 0 if truncated.
    pub fn uint(&self, name: &str) -> u64 {
        match self.get(name) {
            Some(FieldValue::Unsigned(v)) => *v,
            Some(FieldValue::Flag(b)) => u64::from(*b),
            _ => 0,
        }
    }

    /// Signed value, 0 if truncated.
    pub fn int(&self, name: &str) -> i64 {
        match self.get(name) {
            Some(FieldValue::Signed(v)) => *v,
            Some(FieldValue::Unsigned(v)) => *v as i64,
            _ => 0,
        }
    }

    /// Flag value, false if truncated.
    pub fn flag(&self, name: &str) -> bool {
        match self.get(name) {
            Some(FieldValue::Flag(b)) => *b,
            Some(FieldValue::Unsigned(v)) => *v != 0,
            _ => false,
        }
    }

    /// Text value, empty if truncated.
    pub fn text(&self, name: &str) -> String {
        match self.get(name) {
            Some(FieldValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Names of fields that ran past the end of the payload.
    pub fn truncated(&self) -> Vec<&'static str> {
        self.layout
            .fields
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| v.is_none())
            .map(|(field, _)| field.name)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
