//! ais-core: Pure decode library for AIS NMEA sentences (AIVDM/AIVDO).
//!
//! No async, no I/O beyond the config file. This crate is the shared core
//! used by both `ais-feeder` (stream reader) and `ais-server` (CLI + store).

pub mod armor;
pub mod assembler;
pub mod bits;
pub mod config;
pub mod decode;
pub mod emitter;
pub mod layout;
pub mod pipeline;
pub mod sentence;
pub mod types;

// Re-export commonly used types at crate root
pub use armor::decode_payload;
pub use bits::BitBuffer;
pub use decode::decode;
pub use emitter::{
    now_ms, Emitter, KnownStations, MemorySink, RecordSink, StationClass, StationDirectory,
    StationRecord, UpdateKind,
};
pub use pipeline::{decode_sentence, DecodeSwitch, LineOutcome, Pipeline, PipelineOptions, PipelineStats};
pub use sentence::{parse_sentence, RawSentence};
pub use types::*;
