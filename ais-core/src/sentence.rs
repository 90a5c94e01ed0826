//! Parse raw NMEA lines into AIVDM/AIVDO sentences.
//!
//! Responsibilities:
//! - Recognize lines carrying an `AIVDM` or `AIVDO` sentence
//! - Strip anything before the sentence start (tag blocks, receiver prefixes)
//! - Split the seven comma-delimited fields and validate their count
//! - Separate fill bits from the checksum at the `*`
//! - Compute the NMEA checksum (verification is left to the caller)

use crate::types::{AisError, Channel, Result};

/// Sentence identifiers this crate accepts.
pub const AIS_SENTENCES: &[&str] = &["AIVDM", "AIVDO"];

/// Number of comma-delimited fields in an AIVDM/AIVDO sentence.
pub const FIELD_COUNT: usize = 7;

/// Upper bound on fragments per message.
pub const MAX_FRAGMENTS: u8 = 9;

/// True if the line contains an AIVDM or AIVDO sentence at all.
pub fn is_ais_line(line: &str) -> bool {
    AIS_SENTENCES.iter().any(|s| line.contains(s))
}

/// Cut a line down to the sentence itself: from the `!`/`$` that precedes
/// the `AIVDM`/`AIVDO` identifier to the end of the line, trimmed.
pub fn extract_sentence(line: &str) -> Option<&str> {
    let at = AIS_SENTENCES.iter().filter_map(|s| line.find(s)).min()?;
    let start = line[..at]
        .rfind(['!', '$'])
        .filter(|&i| i + 1 == at)
        .unwrap_or(at);
    Some(line[start..].trim())
}

// ---------------------------------------------------------------------------
// RawSentence
// ---------------------------------------------------------------------------

/// The seven fields of one AIVDM/AIVDO line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSentence {
    /// First field, e.g. `!AIVDM`.
    pub tag: String,
    pub fragment_count: u8,
    pub fragment_number: u8,
    /// Multi-sentence message id; `None` when the field is empty.
    pub sequence_id: Option<u8>,
    pub channel: Channel,
    /// 6-bit armored payload.
    pub payload: String,
    /// Number of padding bits in the last payload character.
    pub fill_bits: u8,
    /// Text after the `*`.
    pub checksum: String,
    /// XOR checksum computed over the sentence body.
    pub computed_checksum: u8,
}

impl RawSentence {
    /// AIVDO sentences report the receiver's own vessel.
    pub fn is_own_vessel(&self) -> bool {
        self.tag.ends_with("VDO")
    }

    pub fn is_multipart(&self) -> bool {
        self.fragment_count > 1
    }

    /// Checksum as transmitted, if it parses as two hex digits.
    pub fn declared_checksum(&self) -> Option<u8> {
        let hex = self.checksum.get(..2)?;
        u8::from_str_radix(hex, 16).ok()
    }

    /// True when the transmitted checksum matches the computed one.
    pub fn checksum_ok(&self) -> bool {
        self.declared_checksum() == Some(self.computed_checksum)
    }

    /// Error describing the checksum mismatch, if any.
    pub fn verify_checksum(&self) -> Result<()> {
        if self.checksum_ok() {
            return Ok(());
        }
        Err(AisError::ChecksumMismatch {
            expected: self.declared_checksum().unwrap_or(0),
            actual: self.computed_checksum,
        })
    }
}

/// XOR of every byte between the leading `!`/`$` and the `*`.
pub fn nmea_checksum(sentence: &str) -> u8 {
    let body = sentence
        .strip_prefix(['!', '$'])
        .unwrap_or(sentence);
    let body = body.split_once('*').map(|(b, _)| b).unwrap_or(body);
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Sentence parsing
// ---------------------------------------------------------------------------

/// Parse one line into its seven fields.
///
/// The line may carry leading noise; only the part from the sentence start is
/// used. Any structural problem rejects the whole line.
pub fn parse_sentence(line: &str) -> Result<RawSentence> {
    let sentence = extract_sentence(line)
        .ok_or_else(|| AisError::MalformedSentence("no AIVDM/AIVDO identifier".into()))?;

    let fields: Vec<&str> = sentence.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(AisError::MalformedSentence(format!(
            "expected {FIELD_COUNT} fields, got {}",
            fields.len()
        )));
    }

    let (fill, checksum) = fields[6].split_once('*').ok_or_else(|| {
        AisError::MalformedSentence("missing '*' before checksum".into())
    })?;

    let fragment_count = parse_number(fields[1], "fragment count")?;
    let fragment_number = parse_number(fields[2], "fragment number")?;
    if fragment_count == 0
        || fragment_count > MAX_FRAGMENTS
        || fragment_number == 0
        || fragment_number > fragment_count
    {
        return Err(AisError::MalformedSentence(format!(
            "fragment {fragment_number} of {fragment_count}"
        )));
    }

    let sequence_id = match fields[3].trim() {
        "" => None,
        s => Some(parse_number(s, "sequence id")?),
    };

    Ok(RawSentence {
        tag: fields[0].to_string(),
        fragment_count,
        fragment_number,
        sequence_id,
        channel: Channel::from_field(fields[4]),
        payload: fields[5].to_string(),
        fill_bits: fill.trim().parse().unwrap_or(0),
        checksum: checksum.trim().to_string(),
        computed_checksum: nmea_checksum(sentence),
    })
}

fn parse_number(field: &str, what: &str) -> Result<u8> {
    field
        .trim()
        .parse()
        .map_err(|_| AisError::MalformedSentence(format!("invalid {what}: {field:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION: &str = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";

    #[test]
    fn test_parse_single_fragment() {
        let s = parse_sentence(POSITION).unwrap();
        assert_eq!(s.tag, "!AIVDM");
        assert_eq!(s.fragment_count, 1);
        assert_eq!(s.fragment_number, 1);
        assert_eq!(s.sequence_id, None);
        assert_eq!(s.channel, Channel::B);
        assert_eq!(s.payload, "177KQJ5000G?tO`K>RA1wUbN0TKH");
        assert_eq!(s.fill_bits, 0);
        assert_eq!(s.checksum, "5C");
        assert!(s.checksum_ok());
        assert!(!s.is_own_vessel());
        assert!(!s.is_multipart());
    }

    #[test]
    fn test_parse_multipart_header() {
        let s = parse_sentence("!AIVDM,2,2,1,A,88888888880,2*25").unwrap();
        assert_eq!(s.fragment_count, 2);
        assert_eq!(s.fragment_number, 2);
        assert_eq!(s.sequence_id, Some(1));
        assert_eq!(s.fill_bits, 2);
        assert!(s.checksum_ok());
        assert!(s.is_multipart());
    }

    #[test]
    fn test_parse_own_vessel() {
        let s = parse_sentence("!AIVDO,1,1,,,B5NJ;PP005l4ot5Isbl03wsUkP06,0*74").unwrap();
        assert!(s.is_own_vessel());
        assert_eq!(s.channel, Channel::Unknown);
    }

    #[test]
    fn test_parse_five_fields_rejected() {
        let err = parse_sentence("!AIVDM,1,1,,B").unwrap_err();
        assert!(matches!(err, AisError::MalformedSentence(_)));
    }

    #[test]
    fn test_parse_missing_star_rejected() {
        let err = parse_sentence("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0").unwrap_err();
        assert!(matches!(err, AisError::MalformedSentence(_)));
    }

    #[test]
    fn test_parse_extra_field_rejected() {
        assert!(parse_sentence("!AIVDM,1,1,,B,177KQJ5000G,0,0*5C").is_err());
    }

    #[test]
    fn test_parse_bad_fragment_numbers() {
        assert!(parse_sentence("!AIVDM,x,1,,B,1,0*00").is_err());
        assert!(parse_sentence("!AIVDM,1,2,,B,1,0*00").is_err());
        assert!(parse_sentence("!AIVDM,0,0,,B,1,0*00").is_err());
    }

    #[test]
    fn test_parse_with_prefix_noise() {
        let line = "\\s:2573345,c:1617889000*0C\\!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C\r\n";
        let s = parse_sentence(line).unwrap();
        assert_eq!(s.tag, "!AIVDM");
        assert!(s.checksum_ok());
    }

    #[test]
    fn test_checksum_mismatch_still_parses() {
        let s = parse_sentence("!AIVDM,1,1,,A,15M67FC000G?ufbE`FepT@3n00Sa,0*5C").unwrap();
        assert_eq!(s.declared_checksum(), Some(0x5C));
        assert_eq!(s.computed_checksum, 0x5F);
        assert!(!s.checksum_ok());
        assert!(matches!(
            s.verify_checksum(),
            Err(AisError::ChecksumMismatch {
                expected: 0x5C,
                actual: 0x5F
            })
        ));
    }

    #[test]
    fn test_nmea_checksum() {
        assert_eq!(nmea_checksum(POSITION), 0x5C);
        assert_eq!(nmea_checksum("!AIVDM,2,2,1,A,88888888880,2*25"), 0x25);
    }

    #[test]
    fn test_is_ais_line() {
        assert!(is_ais_line(POSITION));
        assert!(is_ais_line("!AIVDO,1,1,,,B,0*00"));
        assert!(!is_ais_line("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47"));
        assert!(!is_ais_line(""));
    }

    #[test]
    fn test_extract_sentence() {
        assert_eq!(extract_sentence("  !AIVDM,1  "), Some("!AIVDM,1"));
        assert_eq!(extract_sentence("junk$AIVDO,1"), Some("$AIVDO,1"));
        assert_eq!(extract_sentence("AIVDM,1"), Some("AIVDM,1"));
        assert_eq!(extract_sentence("nothing here"), None);
    }
}
