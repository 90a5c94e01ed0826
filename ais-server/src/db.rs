//! SQLite persistence: WAL mode, 3 tables, indexed queries.
//!
//! Schema: stations, positions, captures.
//! Every decoded record upserts its station. Position reports from mobile
//! stations are also appended to `positions`; known (fixed) stations only
//! keep their latest fix on the station row.

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use serde::Serialize;
use std::path::Path;

use ais_core::{
    mmsi_to_string, now_ms, DecodedMessage, Dimensions, Mmsi, PipelineStats, RecordSink,
    StaticDataPart, StationClass, StationRecord,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stations (
    mmsi TEXT PRIMARY KEY,
    class TEXT NOT NULL,
    shipname TEXT,
    callsign TEXT,
    shiptype INTEGER,
    imo INTEGER,
    vendor_id TEXT,
    to_bow INTEGER,
    to_stern INTEGER,
    to_port INTEGER,
    to_starboard INTEGER,
    destination TEXT,
    draught_m REAL,
    eta TEXT,
    mothership TEXT,
    last_lat REAL,
    last_lon REAL,
    last_speed_kts REAL,
    last_course_deg REAL,
    last_heading INTEGER,
    message_count INTEGER DEFAULT 0,
    first_seen_ms INTEGER NOT NULL,
    last_seen_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mmsi TEXT NOT NULL REFERENCES stations(mmsi),
    msg_type INTEGER NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    speed_kts REAL,
    course_deg REAL,
    heading INTEGER,
    status INTEGER,
    own_vessel INTEGER DEFAULT 0,
    timestamp_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS captures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT,
    start_ms INTEGER,
    end_ms INTEGER,
    total_lines INTEGER DEFAULT 0,
    decoded INTEGER DEFAULT 0,
    dropped INTEGER DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_positions_mmsi ON positions(mmsi);
CREATE INDEX IF NOT EXISTS idx_positions_timestamp ON positions(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_stations_last_seen ON stations(last_seen_ms);
CREATE INDEX IF NOT EXISTS idx_stations_class ON stations(class);
"#;

/// Writes per transaction in batch mode.
const BATCH_SIZE: u32 = 500;

fn class_str(class: StationClass) -> &'static str {
    match class {
        StationClass::Known => "known",
        StationClass::Mobile => "mobile",
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn non_zero<T: Default + PartialEq>(v: T) -> Option<T> {
    (v != T::default()).then_some(v)
}

// ---------------------------------------------------------------------------
// Field sets written per update kind
// ---------------------------------------------------------------------------

/// Latest fix carried by a position report.
#[derive(Debug, Default, PartialEq)]
struct Fix {
    lat: Option<f64>,
    lon: Option<f64>,
    speed_kts: Option<f64>,
    course_deg: Option<f64>,
    heading: Option<u16>,
    status: Option<u8>,
}

/// Identity fields; `None` leaves the stored value alone.
#[derive(Debug, Default, PartialEq)]
struct Identity<'a> {
    shipname: Option<&'a str>,
    callsign: Option<&'a str>,
    shiptype: Option<u8>,
    imo: Option<u32>,
    vendor_id: Option<&'a str>,
    dimensions: Option<Dimensions>,
    destination: Option<&'a str>,
    draught_m: Option<f64>,
    eta: Option<String>,
    mothership: Option<Mmsi>,
}

fn fix_of(message: &DecodedMessage) -> Option<Fix> {
    let (lat, lon) = match message.position() {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };
    match message {
        DecodedMessage::PositionReportA(m) => Some(Fix {
            lat,
            lon,
            speed_kts: m.speed(),
            course_deg: m.course(),
            heading: m.true_heading(),
            status: Some(m.status),
        }),
        DecodedMessage::PositionReportB(m) => Some(Fix {
            lat,
            lon,
            speed_kts: m.speed(),
            course_deg: m.course(),
            heading: m.true_heading(),
            status: None,
        }),
        _ => None,
    }
}

fn identity_of(message: &DecodedMessage) -> Option<Identity<'_>> {
    match message {
        DecodedMessage::StaticVoyageData(m) => Some(Identity {
            shipname: non_empty(&m.shipname),
            callsign: non_empty(&m.callsign),
            shiptype: non_zero(m.shiptype),
            imo: non_zero(m.imo),
            dimensions: non_zero(m.dimensions),
            destination: non_empty(&m.destination),
            draught_m: non_zero(m.draught_m),
            eta: (m.eta.month != 0).then(|| {
                format!(
                    "{:02}-{:02} {:02}:{:02}",
                    m.eta.month, m.eta.day, m.eta.hour, m.eta.minute
                )
            }),
            ..Identity::default()
        }),
        DecodedMessage::StaticDataReport(m) => match &m.part {
            StaticDataPart::A(a) => Some(Identity {
                shipname: non_empty(&a.shipname),
                ..Identity::default()
            }),
            StaticDataPart::B(b) => Some(Identity {
                callsign: non_empty(&b.callsign),
                shiptype: non_zero(b.shiptype),
                vendor_id: non_empty(&b.vendor_id),
                dimensions: b.dimensions.and_then(non_zero),
                mothership: b.mothership_mmsi,
                ..Identity::default()
            }),
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite database for AIS station data.
pub struct Database {
    conn: Connection,
    autocommit: bool,
    pending: u32,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Database {
            conn,
            autocommit: true,
            pending: 0,
        })
    }

    #[cfg(test)]
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    /// Set batch mode (disable autocommit for throughput).
    /// Switching back on commits whatever is pending.
    pub fn set_autocommit(&mut self, autocommit: bool) -> SqlResult<()> {
        if autocommit == self.autocommit {
            return Ok(());
        }
        self.conn
            .execute_batch(if autocommit { "COMMIT;" } else { "BEGIN;" })?;
        self.autocommit = autocommit;
        self.pending = 0;
        Ok(())
    }

    fn maybe_commit(&mut self) -> SqlResult<()> {
        self.pending += 1;
        if self.pending >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Commit any pending writes.
    pub fn flush(&mut self) -> SqlResult<()> {
        if !self.autocommit && self.pending > 0 {
            self.conn.execute_batch("COMMIT; BEGIN;")?;
        }
        self.pending = 0;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Apply records
    // -----------------------------------------------------------------------

    /// Store one decoded record.
    pub fn apply_record(&mut self, record: &StationRecord) -> SqlResult<()> {
        let class = class_str(record.class);
        let ts = record.received_at_ms;

        if let Some(fix) = fix_of(&record.message) {
            self.upsert_position(record.mmsi, class, &fix, ts)?;
            if record.class == StationClass::Mobile {
                if let (Some(lat), Some(lon)) = (fix.lat, fix.lon) {
                    self.add_position(
                        record.mmsi,
                        record.message.msg_type(),
                        lat,
                        lon,
                        &fix,
                        record.own_vessel,
                        ts,
                    )?;
                }
            }
        } else if let Some(identity) = identity_of(&record.message) {
            self.upsert_identity(record.mmsi, class, &identity, ts)?;
        }
        self.maybe_commit()
    }

    // -----------------------------------------------------------------------
    // Stations
    // -----------------------------------------------------------------------

    fn upsert_position(&mut self, mmsi: Mmsi, class: &str, fix: &Fix, ts: i64) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO stations (mmsi, class, last_lat, last_lon, last_speed_kts, last_course_deg,
                                   last_heading, message_count, first_seen_ms, last_seen_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
             ON CONFLICT(mmsi) DO UPDATE SET
                 class = excluded.class,
                 last_lat = COALESCE(excluded.last_lat, last_lat),
                 last_lon = COALESCE(excluded.last_lon, last_lon),
                 last_speed_kts = excluded.last_speed_kts,
                 last_course_deg = excluded.last_course_deg,
                 last_heading = excluded.last_heading,
                 message_count = message_count + 1,
                 first_seen_ms = MIN(first_seen_ms, excluded.first_seen_ms),
                 last_seen_ms = MAX(last_seen_ms, excluded.last_seen_ms)",
            params![
                mmsi_to_string(mmsi),
                class,
                fix.lat,
                fix.lon,
                fix.speed_kts,
                fix.course_deg,
                fix.heading,
                ts
            ],
        )?;
        Ok(())
    }

    fn upsert_identity(
        &mut self,
        mmsi: Mmsi,
        class: &str,
        id: &Identity<'_>,
        ts: i64,
    ) -> SqlResult<()> {
        let dims = id.dimensions;
        self.conn.execute(
            "INSERT INTO stations (mmsi, class, shipname, callsign, shiptype, imo, vendor_id,
                                   to_bow, to_stern, to_port, to_starboard, destination, draught_m,
                                   eta, mothership, message_count, first_seen_ms, last_seen_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1, ?16, ?16)
             ON CONFLICT(mmsi) DO UPDATE SET
                 class = excluded.class,
                 shipname = COALESCE(excluded.shipname, shipname),
                 callsign = COALESCE(excluded.callsign, callsign),
                 shiptype = COALESCE(excluded.shiptype, shiptype),
                 imo = COALESCE(excluded.imo, imo),
                 vendor_id = COALESCE(excluded.vendor_id, vendor_id),
                 to_bow = COALESCE(excluded.to_bow, to_bow),
                 to_stern = COALESCE(excluded.to_stern, to_stern),
                 to_port = COALESCE(excluded.to_port, to_port),
                 to_starboard = COALESCE(excluded.to_starboard, to_starboard),
                 destination = COALESCE(excluded.destination, destination),
                 draught_m = COALESCE(excluded.draught_m, draught_m),
                 eta = COALESCE(excluded.eta, eta),
                 mothership = COALESCE(excluded.mothership, mothership),
                 message_count = message_count + 1,
                 first_seen_ms = MIN(first_seen_ms, excluded.first_seen_ms),
                 last_seen_ms = MAX(last_seen_ms, excluded.last_seen_ms)",
            params![
                mmsi_to_string(mmsi),
                class,
                id.shipname,
                id.callsign,
                id.shiptype,
                id.imo,
                id.vendor_id,
                dims.map(|d| d.to_bow),
                dims.map(|d| d.to_stern),
                dims.map(|d| d.to_port),
                dims.map(|d| d.to_starboard),
                id.destination,
                id.draught_m,
                id.eta,
                id.mothership.map(mmsi_to_string),
                ts
            ],
        )?;
        Ok(())
    }

    pub fn get_station(&self, mmsi: Mmsi) -> Option<StationRow> {
        self.conn
            .query_row(
                &format!("SELECT {STATION_COLUMNS} FROM stations WHERE mmsi = ?1"),
                params![mmsi_to_string(mmsi)],
                station_row,
            )
            .optional()
            .ok()
            .flatten()
    }

    /// All stations, most recently heard first.
    pub fn get_all_stations(&self) -> SqlResult<Vec<StationRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STATION_COLUMNS} FROM stations ORDER BY last_seen_ms DESC"
        ))?;
        let rows = stmt.query_map([], station_row)?;
        rows.collect()
    }

    pub fn count_stations(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM stations", [], |r| r.get(0))
            .unwrap_or(0)
    }

    fn count_class(&self, class: StationClass) -> i64 {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM stations WHERE class = ?1",
                params![class_str(class)],
                |r| r.get(0),
            )
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn add_position(
        &mut self,
        mmsi: Mmsi,
        msg_type: u8,
        lat: f64,
        lon: f64,
        fix: &Fix,
        own_vessel: bool,
        ts: i64,
    ) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO positions (mmsi, msg_type, lat, lon, speed_kts, course_deg, heading, status,
                                    own_vessel, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                mmsi_to_string(mmsi),
                msg_type,
                lat,
                lon,
                fix.speed_kts,
                fix.course_deg,
                fix.heading,
                fix.status,
                own_vessel as i32,
                ts
            ],
        )?;
        Ok(())
    }

    /// Latest positions for one station, most recent first.
    pub fn get_positions(&self, mmsi: Mmsi, limit: i64) -> SqlResult<Vec<PositionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT mmsi, msg_type, lat, lon, speed_kts, course_deg, heading, timestamp_ms
             FROM positions WHERE mmsi = ?1 ORDER BY timestamp_ms DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![mmsi_to_string(mmsi), limit], |r| {
            Ok(PositionRow {
                mmsi: r.get(0)?,
                msg_type: r.get(1)?,
                lat: r.get(2)?,
                lon: r.get(3)?,
                speed_kts: r.get(4)?,
                course_deg: r.get(5)?,
                heading: r.get(6)?,
                timestamp_ms: r.get(7)?,
            })
        })?;
        rows.collect()
    }

    pub fn count_positions(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM positions", [], |r| r.get(0))
            .unwrap_or(0)
    }

    /// Delete positions older than `max_age_hours`. Returns rows removed.
    pub fn prune_positions(&mut self, max_age_hours: i64) -> SqlResult<usize> {
        let cutoff = now_ms().saturating_sub(max_age_hours.saturating_mul(3_600_000));
        self.conn.execute(
            "DELETE FROM positions WHERE timestamp_ms < ?1",
            params![cutoff],
        )
    }

    // -----------------------------------------------------------------------
    // Captures
    // -----------------------------------------------------------------------

    /// Start a new capture session. Returns capture_id.
    pub fn start_capture(&mut self, source: &str) -> SqlResult<i64> {
        self.conn.execute(
            "INSERT INTO captures (source, start_ms) VALUES (?1, ?2)",
            params![source, now_ms()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.maybe_commit()?;
        Ok(id)
    }

    pub fn end_capture(&mut self, capture_id: i64, stats: &PipelineStats) -> SqlResult<()> {
        self.conn.execute(
            "UPDATE captures SET end_ms = ?1, total_lines = ?2, decoded = ?3, dropped = ?4
             WHERE id = ?5",
            params![now_ms(), stats.lines, stats.decoded, stats.dropped(), capture_id],
        )?;
        self.maybe_commit()
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> DbStats {
        DbStats {
            stations: self.count_stations(),
            known: self.count_class(StationClass::Known),
            mobile: self.count_class(StationClass::Mobile),
            positions: self.count_positions(),
            captures: self
                .conn
                .query_row("SELECT COUNT(*) FROM captures", [], |r| r.get(0))
                .unwrap_or(0),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.autocommit {
            let _ = self.conn.execute_batch("COMMIT;");
        }
    }
}

impl RecordSink for Database {
    type Error = rusqlite::Error;

    fn write(&mut self, record: StationRecord) -> SqlResult<()> {
        self.apply_record(&record)
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

const STATION_COLUMNS: &str = "mmsi, class, shipname, callsign, shiptype, imo, vendor_id, \
     to_bow, to_stern, to_port, to_starboard, destination, draught_m, eta, mothership, \
     last_lat, last_lon, last_speed_kts, last_course_deg, last_heading, message_count, \
     first_seen_ms, last_seen_ms";

fn station_row(r: &rusqlite::Row<'_>) -> SqlResult<StationRow> {
    Ok(StationRow {
        mmsi: r.get(0)?,
        class: r.get(1)?,
        shipname: r.get(2)?,
        callsign: r.get(3)?,
        shiptype: r.get(4)?,
        imo: r.get(5)?,
        vendor_id: r.get(6)?,
        to_bow: r.get(7)?,
        to_stern: r.get(8)?,
        to_port: r.get(9)?,
        to_starboard: r.get(10)?,
        destination: r.get(11)?,
        draught_m: r.get(12)?,
        eta: r.get(13)?,
        mothership: r.get(14)?,
        last_lat: r.get(15)?,
        last_lon: r.get(16)?,
        last_speed_kts: r.get(17)?,
        last_course_deg: r.get(18)?,
        last_heading: r.get(19)?,
        message_count: r.get(20)?,
        first_seen_ms: r.get(21)?,
        last_seen_ms: r.get(22)?,
    })
}

#[derive(Debug, Serialize)]
pub struct StationRow {
    pub mmsi: String,
    pub class: String,
    pub shipname: Option<String>,
    pub callsign: Option<String>,
    pub shiptype: Option<i64>,
    pub imo: Option<i64>,
    pub vendor_id: Option<String>,
    pub to_bow: Option<i64>,
    pub to_stern: Option<i64>,
    pub to_port: Option<i64>,
    pub to_starboard: Option<i64>,
    pub destination: Option<String>,
    pub draught_m: Option<f64>,
    pub eta: Option<String>,
    pub mothership: Option<String>,
    pub last_lat: Option<f64>,
    pub last_lon: Option<f64>,
    pub last_speed_kts: Option<f64>,
    pub last_course_deg: Option<f64>,
    pub last_heading: Option<i64>,
    pub message_count: i64,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct PositionRow {
    pub mmsi: String,
    pub msg_type: i64,
    pub lat: f64,
    pub lon: f64,
    pub speed_kts: Option<f64>,
    pub course_deg: Option<f64>,
    pub heading: Option<i64>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct DbStats {
    pub stations: i64,
    pub known: i64,
    pub mobile: i64,
    pub positions: i64,
    pub captures: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ais_core::{KnownStations, Pipeline, PipelineOptions};

    const POSITION_A: &str = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";
    const POSITION_B: &str = "!AIVDM,1,1,,A,B5NJ;PP005l4ot5Isbl03wsUkP06,0*76";
    const VOYAGE_1: &str =
        "!AIVDM,2,1,1,A,55?MbV02;H;s<HtKR20EHE:0@T4@Dn2222222216L961O5Gf0NSQEp6ClRp8,0*1C";
    const VOYAGE_2: &str = "!AIVDM,2,2,1,A,88888888880,2*25";
    const STATIC_A: &str = "!AIVDM,1,1,,A,H42O55i18tMET00000000000000,2*6D";
    const STATIC_B: &str = "!AIVDM,1,1,,B,H5NLOjTUG5CD=1BG46mqhj0P7130,0*7B";

    fn test_db() -> Database {
        Database::open_memory().unwrap()
    }

    fn feed(db: &mut Database, known: &[Mmsi], lines: &[(&str, i64)]) {
        let mut pipeline = Pipeline::new(
            KnownStations::new(known.iter().copied()),
            PipelineOptions::default(),
        );
        for (line, ts) in lines {
            pipeline.feed(line, *ts, db).unwrap();
        }
    }

    #[test]
    fn test_open_memory() {
        let db = test_db();
        assert_eq!(db.count_stations(), 0);
        assert_eq!(db.count_positions(), 0);
    }

    #[test]
    fn test_mobile_position_appended() {
        let mut db = test_db();
        feed(&mut db, &[], &[(POSITION_A, 1_000), (POSITION_A, 2_000)]);

        let st = db.get_station(477_553_000).unwrap();
        assert_eq!(st.mmsi, "477553000");
        assert_eq!(st.class, "mobile");
        assert_eq!(st.message_count, 2);
        assert_eq!(st.first_seen_ms, 1_000);
        assert_eq!(st.last_seen_ms, 2_000);
        assert!((st.last_lat.unwrap() - 47.582833).abs() < 1e-5);
        assert!((st.last_lon.unwrap() + 122.345833).abs() < 1e-5);
        assert_eq!(st.last_heading, Some(181));

        let positions = db.get_positions(477_553_000, 10).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].timestamp_ms, 2_000);
        assert_eq!(positions[0].msg_type, 1);
    }

    #[test]
    fn test_known_station_not_tracked() {
        let mut db = test_db();
        feed(&mut db, &[367_430_530], &[(POSITION_B, 5)]);

        let st = db.get_station(367_430_530).unwrap();
        assert_eq!(st.class, "known");
        assert!(st.last_lat.is_some());
        assert_eq!(st.last_heading, None);
        assert_eq!(db.count_positions(), 0);
        assert_eq!(db.stats().known, 1);
    }

    #[test]
    fn test_voyage_identity_upsert() {
        let mut db = test_db();
        feed(&mut db, &[], &[(VOYAGE_1, 10), (VOYAGE_2, 11)]);

        let st = db.get_station(351_759_000).unwrap();
        assert_eq!(st.shipname.as_deref(), Some("EVER DIADEM"));
        assert_eq!(st.callsign.as_deref(), Some("3FOF8"));
        assert_eq!(st.imo, Some(9_134_270));
        assert_eq!(st.shiptype, Some(70));
        assert_eq!(st.to_bow, Some(225));
        assert_eq!(st.to_starboard, Some(31));
        assert_eq!(st.destination.as_deref(), Some("NEW YORK"));
        assert_eq!(st.draught_m, Some(12.2));
        assert_eq!(st.eta.as_deref(), Some("05-15 14:00"));
        assert_eq!(st.last_seen_ms, 11);
        assert_eq!(db.count_positions(), 0);
    }

    #[test]
    fn test_static_parts_merge() {
        let mut db = test_db();
        feed(&mut db, &[], &[(STATIC_B, 1)]);
        let st = db.get_station(367_468_490).unwrap();
        assert_eq!(st.vendor_id.as_deref(), Some("WES"));
        assert_eq!(st.callsign.as_deref(), Some("WDF5902"));
        assert_eq!(st.shiptype, Some(37));
        assert_eq!(st.to_bow, Some(4));
        assert_eq!(st.shipname, None);

        feed(&mut db, &[], &[(STATIC_A, 2)]);
        let st = db.get_station(271_041_815).unwrap();
        assert_eq!(st.shipname.as_deref(), Some("PROGUY"));
        assert_eq!(db.count_stations(), 2);
    }

    #[test]
    fn test_identity_keeps_position() {
        let mut db = test_db();
        let record_pos = Pipeline::new(KnownStations::default(), PipelineOptions::default())
            .process_line(POSITION_A, 1)
            .record()
            .unwrap();
        db.apply_record(&record_pos).unwrap();

        let mut record_id = record_pos.clone();
        record_id.message = ais_core::decode_sentence(STATIC_A).unwrap();
        record_id.received_at_ms = 3;
        db.apply_record(&record_id).unwrap();

        let st = db.get_station(477_553_000).unwrap();
        assert!(st.last_lat.is_some());
        assert_eq!(st.shipname.as_deref(), Some("PROGUY"));
        assert_eq!(st.message_count, 2);
    }

    #[test]
    fn test_capture_lifecycle() {
        let mut db = test_db();
        let id = db.start_capture("test.nmea").unwrap();
        assert!(id > 0);

        let stats = PipelineStats {
            lines: 10,
            decoded: 7,
            malformed: 2,
            ..PipelineStats::default()
        };
        db.end_capture(id, &stats).unwrap();
        assert_eq!(db.stats().captures, 1);
    }

    #[test]
    fn test_batch_mode_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ais.db");
        let path = path.to_str().unwrap();

        {
            let mut db = Database::open(path).unwrap();
            db.set_autocommit(false).unwrap();
            feed(&mut db, &[], &[(POSITION_A, 1), (POSITION_B, 2)]);
            db.flush().unwrap();
            db.set_autocommit(true).unwrap();
        }

        let db = Database::open(path).unwrap();
        let stats = db.stats();
        assert_eq!(stats.stations, 2);
        assert_eq!(stats.mobile, 2);
        assert_eq!(stats.positions, 2);
    }

    #[test]
    fn test_drop_commits_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ais.db");
        let path = path.to_str().unwrap();

        {
            let mut db = Database::open(path).unwrap();
            db.set_autocommit(false).unwrap();
            feed(&mut db, &[], &[(POSITION_A, 1)]);
        }

        let db = Database::open(path).unwrap();
        assert_eq!(db.count_stations(), 1);
    }

    #[test]
    fn test_get_all_stations_order() {
        let mut db = test_db();
        feed(&mut db, &[], &[(POSITION_A, 1), (POSITION_B, 9)]);
        let all = db.get_all_stations().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].mmsi, "367430530");
    }

    #[test]
    fn test_prune_positions() {
        let mut db = test_db();
        feed(&mut db, &[], &[(POSITION_A, 1), (POSITION_A, now_ms())]);
        assert_eq!(db.prune_positions(1).unwrap(), 1);
        assert_eq!(db.count_positions(), 1);
    }

    #[test]
    fn test_prune_huge_age_keeps_everything() {
        let mut db = test_db();
        feed(&mut db, &[], &[(POSITION_A, 1), (POSITION_B, 2)]);
        assert_eq!(db.prune_positions(i64::MAX).unwrap(), 0);
        assert_eq!(db.count_positions(), 2);
    }
}
