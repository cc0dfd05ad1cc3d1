//! Record projection
//!
//! Flattens a calendar-entry record plus its expanded event relation into
//! the flat shape consumed by downstream automation. The CRM field names
//! and the output keys are related by fixed tables, not by convention: the
//! schema casing used to `$expand` the relation is not the casing the same
//! relation comes back under in the response body.

use serde_json::{Map, Value};

/// Annotation suffix pairing a coded field with its display label
pub const FORMATTED_VALUE_SUFFIX: &str = "@OData.Community.Display.V1.FormattedValue";

/// Navigation property name as written in `$expand` (schema casing)
pub const EVENT_RELATION_QUERY: &str = "cr6ef_Event";
/// Key the expanded relation comes back under in the response body
pub const EVENT_RELATION_RESPONSE: &str = "cr6ef_event";

/// One source-field-to-output-key mapping. `label_output` names the output
/// key that receives the source field's formatted-value annotation.
pub struct FieldMapping {
    pub source: &'static str,
    pub output: &'static str,
    pub label_output: Option<&'static str>,
}

/// Fields copied from the calendar entry itself
pub const PARENT_FIELDS: &[FieldMapping] = &[
    FieldMapping {
        source: "cr6ef_calendarvenueid",
        output: "id",
        label_output: None,
    },
    FieldMapping {
        source: "cr6ef_eventdate",
        output: "eventDate",
        label_output: None,
    },
    FieldMapping {
        source: "cr6ef_categorycode",
        output: "categoryCode",
        label_output: Some("categoryLabel"),
    },
];

/// Fields copied from the expanded event relation
pub const EVENT_FIELDS: &[FieldMapping] = &[
    FieldMapping {
        source: "cr6ef_eventoid",
        output: "eventId",
        label_output: None,
    },
    FieldMapping {
        source: "cr6ef_name",
        output: "eventName",
        label_output: None,
    },
    FieldMapping {
        source: "statuscode",
        output: "eventStatusCode",
        label_output: Some("eventStatusLabel"),
    },
    FieldMapping {
        source: "_cr6ef_venue_value",
        output: "venueId",
        label_output: Some("venueName"),
    },
];

/// The expanded relation object, if present and populated
fn relation_of(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    record.get(EVENT_RELATION_RESPONSE).and_then(Value::as_object)
}

/// Copy mapped fields into `out`. Each output key is written even when the
/// source is absent, so the key set never varies with the input.
fn copy_fields(
    out: &mut Map<String, Value>,
    source: Option<&Map<String, Value>>,
    mappings: &[FieldMapping],
) {
    for mapping in mappings {
        let value = source
            .and_then(|s| s.get(mapping.source))
            .cloned()
            .unwrap_or(Value::Null);
        out.insert(mapping.output.to_string(), value);

        if let Some(label_key) = mapping.label_output {
            let annotated = format!("{}{}", mapping.source, FORMATTED_VALUE_SUFFIX);
            let label = source
                .and_then(|s| s.get(&annotated))
                .cloned()
                .unwrap_or(Value::Null);
            out.insert(label_key.to_string(), label);
        }
    }
}

fn project_record(
    record: &Map<String, Value>,
    relation: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut out = Map::new();
    copy_fields(&mut out, Some(record), PARENT_FIELDS);
    copy_fields(&mut out, relation, EVENT_FIELDS);
    out
}

/// Project a list response, preserving upstream order. Entries without a
/// populated event relation carry no meaning for callers and are dropped.
pub fn project_list(records: &[Value]) -> Vec<Map<String, Value>> {
    records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|record| relation_of(record).map(|relation| project_record(record, Some(relation))))
        .collect()
}

/// Project a directly fetched record. Unlike the list path, a missing
/// relation does not drop the record; the relation-scoped keys all come
/// back null instead.
pub fn project_single(record: &Map<String, Value>) -> Map<String, Value> {
    project_record(record, relation_of(record))
}
