//! EDR records: raw lines, header, enrichment
//!
//! A data line is split on the delimiter, its trailing field (an artifact
//! of the delimiter every line ends with) is dropped, and six provenance
//! fields are appended before the values are zipped with the header.

use crate::error::{IngestError, Result};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Provenance columns appended to every header, in order.
pub const ZZ_FILENAME: &str = "ZZ_FILENAME";
pub const ZZ_BATCH_ID: &str = "ZZ_BATCH_ID";
pub const ZZ_PROCESSED_DATETIME: &str = "ZZ_PROCESSED_DATETIME";
pub const ZZ_PARTITION_KEY: &str = "ZZ_PARTITION_KEY";
pub const ZZ_EVENT_TS_ISO: &str = "ZZ_EVENT_TS_ISO";
pub const ZZ_EVENT_TS_EPOC: &str = "ZZ_EVENT_TS_EPOC";

pub const PROVENANCE_FIELDS: [&str; 6] = [
    ZZ_FILENAME,
    ZZ_BATCH_ID,
    ZZ_PROCESSED_DATETIME,
    ZZ_PARTITION_KEY,
    ZZ_EVENT_TS_ISO,
    ZZ_EVENT_TS_EPOC,
];

/// Source column positions used by enrichment.
pub const EVENT_TIMESTAMP_INDEX: usize = 4;
pub const DIVISION_ID_INDEX: usize = 6;
pub const SUBSCRIBER_ID_INDEX: usize = 8;
pub const SUBSCRIBER_TYPE_INDEX: usize = 9;
pub const DEVICE_ID_INDEX: usize = 10;

/// Fields a data line needs once its trailing field is dropped.
pub const MIN_SOURCE_FIELDS: usize = DEVICE_ID_INDEX + 1;

pub const PARTITION_KEY_SEPARATOR: &str = "|";

/// One data line, trailing field already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    line_number: u64,
    fields: Vec<String>,
}

impl RawLine {
    /// Build from every field of a split line; the last one is discarded.
    pub fn from_split_fields(line_number: u64, mut fields: Vec<String>) -> Self {
        fields.pop();
        Self {
            line_number,
            fields,
        }
    }

    /// Split `line` on `delimiter`, trim each field, drop the last.
    pub fn parse(line_number: u64, line: &str, delimiter: char) -> Self {
        let fields = line
            .split(delimiter)
            .map(|field| field.trim().to_string())
            .collect();
        Self::from_split_fields(line_number, fields)
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Column names of the file plus the provenance columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    source_columns: usize,
}

impl Header {
    /// Build from the split first line of the file; the last name is discarded.
    pub fn from_split_fields(mut fields: Vec<String>) -> Self {
        fields.pop();
        let source_columns = fields.len();
        fields.extend(PROVENANCE_FIELDS.iter().map(|name| name.to_string()));

        Self {
            names: fields,
            source_columns,
        }
    }

    pub fn parse(line: &str, delimiter: char) -> Self {
        Self::from_split_fields(
            line.split(delimiter)
                .map(|name| name.trim().to_string())
                .collect(),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of columns that come from the file itself.
    pub fn source_columns(&self) -> usize {
        self.source_columns
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// A single document value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Field name to value mapping in header order.
///
/// Serializes as a JSON object whose keys keep the header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl EnrichedRecord {
    pub fn from_pairs(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for EnrichedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnrichedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = EnrichedRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to string or integer values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, FieldValue>()? {
                    fields.push((name, value));
                }
                Ok(EnrichedRecord { fields })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// `device|subscriber|subscriber_type|division`
pub fn composite_key(device_id: &str, subscriber_id: &str, subscriber_type: &str, division_id: &str) -> String {
    [device_id, subscriber_id, subscriber_type, division_id].join(PARTITION_KEY_SEPARATOR)
}

/// Turns raw lines of one file into enriched records.
#[derive(Debug, Clone)]
pub struct RecordEnricher {
    header: Header,
    file_name: String,
}

impl RecordEnricher {
    pub fn new(header: Header, file_name: impl Into<String>) -> Self {
        Self {
            header,
            file_name: file_name.into(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Enrich one line for the batch `batch_id`.
    pub fn enrich(
        &self,
        line: RawLine,
        batch_id: u64,
        processed_at: DateTime<Utc>,
    ) -> Result<EnrichedRecord> {
        let line_number = line.line_number;

        if line.len() < MIN_SOURCE_FIELDS {
            return Err(IngestError::RecordTooShort {
                line: line_number,
                found: line.len(),
                required: MIN_SOURCE_FIELDS,
            });
        }

        if line.len() != self.header.source_columns() {
            return Err(IngestError::ColumnMismatch {
                line: line_number,
                expected: self.header.source_columns(),
                found: line.len(),
            });
        }

        let fields = line.fields;
        let event_ts = timestamp::derive(&fields[EVENT_TIMESTAMP_INDEX]).map_err(|source| {
            IngestError::MalformedTimestamp {
                line: line_number,
                source,
            }
        })?;
        let partition_key = composite_key(
            &fields[DEVICE_ID_INDEX],
            &fields[SUBSCRIBER_ID_INDEX],
            &fields[SUBSCRIBER_TYPE_INDEX],
            &fields[DIVISION_ID_INDEX],
        );

        let provenance = [
            FieldValue::from(self.file_name.as_str()),
            FieldValue::Integer(i64::try_from(batch_id).unwrap_or(i64::MAX)),
            FieldValue::Text(timestamp::processed_at(processed_at)),
            FieldValue::Text(partition_key),
            FieldValue::Text(event_ts.iso),
            FieldValue::Integer(event_ts.epoch_seconds),
        ];

        let values = fields
            .into_iter()
            .map(FieldValue::Text)
            .chain(provenance);

        Ok(EnrichedRecord::from_pairs(
            self.header.names().iter().cloned().zip(values).collect(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER: &str = "PROCESS_ID,COMPONENT_ID,TRANSACTION_ID,SESSION_ID,EVENT_TIMESTAMP,EVENT_TYPE,DIVISION_ID,GROUP_ID,SUBSCRIBER_ID,SUBSCRIBER_TYPE,DEVICE_ID,PLAN_ID,NOTIFICATION_TYPE,NOTIFICATION_ADDRESS,USAGE,CHARGE_AMOUNT,";
    const LINE: &str = "P1,C1,TX-0001,S-9,2017/01/01 00:00:01.123456,DATA,DIV7,G2,SUB42,PREPAID,DEV99,PLAN5,SMS,555-0100,2048,1.25,";

    fn enricher() -> RecordEnricher {
        RecordEnricher::new(Header::parse(HEADER, ','), "edr_20170101.csv")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_header_appends_provenance() {
        let header = Header::parse(HEADER, ',');

        assert_eq!(header.source_columns(), 16);
        assert_eq!(header.len(), 22);
        assert_eq!(&header.names()[16..], &PROVENANCE_FIELDS.map(String::from)[..]);
        assert!(header.contains("TRANSACTION_ID"));
    }

    #[test]
    fn test_raw_line_drops_trailing_field() {
        let line = RawLine::parse(3, " a , b ,c,", ',');

        assert_eq!(line.fields(), &["a", "b", "c"]);
        assert_eq!(line.line_number(), 3);
    }

    #[test]
    fn test_enrich_builds_all_fields() {
        let record = enricher()
            .enrich(RawLine::parse(2, LINE, ','), 3, now())
            .unwrap();

        assert_eq!(record.len(), 22);
        assert_eq!(record.get("TRANSACTION_ID"), Some(&FieldValue::from("TX-0001")));
        assert_eq!(record.get(ZZ_FILENAME), Some(&FieldValue::from("edr_20170101.csv")));
        assert_eq!(record.get(ZZ_BATCH_ID), Some(&FieldValue::Integer(3)));
        assert_eq!(
            record.get(ZZ_PROCESSED_DATETIME),
            Some(&FieldValue::from("2024-02-01T12:00:00.000"))
        );
        assert_eq!(
            record.get(ZZ_PARTITION_KEY),
            Some(&FieldValue::from("DEV99|SUB42|PREPAID|DIV7"))
        );
        assert_eq!(
            record.get(ZZ_EVENT_TS_ISO),
            Some(&FieldValue::from("2017-01-01T00:00:01.123"))
        );
        assert_eq!(record.get(ZZ_EVENT_TS_EPOC), Some(&FieldValue::Integer(1_483_228_801)));
    }

    #[test]
    fn test_enrich_keeps_header_order() {
        let enricher = enricher();
        let record = enricher.enrich(RawLine::parse(2, LINE, ','), 0, now()).unwrap();

        let names: Vec<&str> = record.field_names().collect();
        let expected: Vec<&str> = enricher.header().names().iter().map(String::as_str).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_short_line_is_rejected() {
        let err = enricher()
            .enrich(RawLine::parse(5, "a,b,c,d,e,", ','), 0, now())
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::RecordTooShort {
                line: 5,
                found: 5,
                required: 11
            }
        ));
    }

    #[test]
    fn test_column_mismatch_is_rejected() {
        let line = format!("{}EXTRA,", LINE);
        let err = enricher()
            .enrich(RawLine::parse(9, &line, ','), 0, now())
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::ColumnMismatch {
                line: 9,
                expected: 16,
                found: 17
            }
        ));
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let line = LINE.replace("00:00:01.123456", "00:00:01.123");
        let err = enricher()
            .enrich(RawLine::parse(4, &line, ','), 0, now())
            .unwrap_err();

        assert!(matches!(err, IngestError::MalformedTimestamp { line: 4, .. }));
    }

    #[test]
    fn test_composite_key_order() {
        assert_eq!(composite_key("Dv", "S", "Ty", "D"), "Dv|S|Ty|D");
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = enricher().enrich(RawLine::parse(2, LINE, ','), 1, now()).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with("{\"PROCESS_ID\":\"P1\""));
        assert!(json.contains("\"ZZ_BATCH_ID\":1"));
        assert!(json.contains("\"USAGE\":\"2048\""));

        let decoded: EnrichedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }
}
