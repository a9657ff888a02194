//! Index settings and field mappings for EDR documents

use serde_json::{json, Map, Value};

/// Format of `ZZ_PROCESSED_DATETIME` and `ZZ_EVENT_TS_ISO`
/// (`yyyy-MM-dd'T'HH:mm:ss.SSS`).
pub const ISO_MILLIS_DATE_FORMAT: &str = "date_hour_minute_second_millis";

/// Format of `ZZ_EVENT_TS_EPOC`.
pub const EPOCH_SECOND_DATE_FORMAT: &str = "epoch_second";

const KEYWORD_FIELDS: &[&str] = &[
    "PROCESS_ID",
    "COMPONENT_ID",
    "TRANSACTION_ID",
    "SESSION_ID",
    "EVENT_TIMESTAMP",
    "EVENT_TYPE",
    "DIVISION_ID",
    "GROUP_ID",
    "SUBSCRIBER_ID",
    "SUBSCRIBER_TYPE",
    "DEVICE_ID",
    "PLAN_ID",
    "NOTIFICATION_TYPE",
    "NOTIFICATION_ADDRESS",
    "ZZ_FILENAME",
    "ZZ_PARTITION_KEY",
];

const LONG_FIELDS: &[&str] = &["USAGE", "ZZ_BATCH_ID"];

const DOUBLE_FIELDS: &[&str] = &["CHARGE_AMOUNT"];

const ISO_DATE_FIELDS: &[&str] = &["ZZ_PROCESSED_DATETIME", "ZZ_EVENT_TS_ISO"];

const EPOCH_DATE_FIELDS: &[&str] = &["ZZ_EVENT_TS_EPOC"];

/// Field name to mapping definition for every EDR column.
pub fn edr_properties() -> Map<String, Value> {
    let mut properties = Map::new();

    for field in KEYWORD_FIELDS {
        properties.insert(field.to_string(), json!({ "type": "keyword" }));
    }
    for field in LONG_FIELDS {
        properties.insert(field.to_string(), json!({ "type": "long" }));
    }
    for field in DOUBLE_FIELDS {
        properties.insert(field.to_string(), json!({ "type": "double" }));
    }
    for field in ISO_DATE_FIELDS {
        properties.insert(
            field.to_string(),
            json!({ "type": "date", "format": ISO_MILLIS_DATE_FORMAT }),
        );
    }
    for field in EPOCH_DATE_FIELDS {
        properties.insert(
            field.to_string(),
            json!({ "type": "date", "format": EPOCH_SECOND_DATE_FORMAT }),
        );
    }

    properties
}

/// Body of the create-index request.
///
/// With a legacy mapping type the properties are nested under the type name,
/// as clusters that still use types expect.
pub fn edr_index_body(doc_type: Option<&str>) -> Value {
    let typeless = json!({ "properties": edr_properties() });
    let mappings = match doc_type {
        Some(doc_type) => {
            let mut typed = Map::new();
            typed.insert(doc_type.to_string(), typeless);
            Value::Object(typed)
        },
        None => typeless,
    };

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0
        },
        "mappings": mappings
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_column_is_mapped() {
        let properties = edr_properties();

        assert_eq!(properties.len(), 22);
        assert_eq!(properties["USAGE"]["type"], "long");
        assert_eq!(properties["CHARGE_AMOUNT"]["type"], "double");
        assert_eq!(properties["DEVICE_ID"]["type"], "keyword");
        assert_eq!(properties["ZZ_EVENT_TS_ISO"]["format"], ISO_MILLIS_DATE_FORMAT);
        assert_eq!(properties["ZZ_EVENT_TS_EPOC"]["format"], EPOCH_SECOND_DATE_FORMAT);
    }

    #[test]
    fn test_typed_body_nests_properties() {
        let body = edr_index_body(Some("edr"));

        assert_eq!(body["settings"]["number_of_shards"], 1);
        assert_eq!(body["settings"]["number_of_replicas"], 0);
        assert_eq!(body["mappings"]["edr"]["properties"]["ZZ_BATCH_ID"]["type"], "long");
    }

    #[test]
    fn test_typeless_body() {
        let body = edr_index_body(None);

        assert_eq!(body["mappings"]["properties"]["ZZ_BATCH_ID"]["type"], "long");
        assert!(body["mappings"].get("edr").is_none());
    }
}
