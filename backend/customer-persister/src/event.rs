//! Domain event decoding and customer extraction
//!
//! Events arrive as opaque JSON objects. Only the `customer` key is inspected:
//!
//! ```text
//! { "customer": { "id": <string|number>, ...other fields... } | null, ...other event fields... }
//! ```

use crate::error::{PersisterError, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Key under which events carry the customer sub-record
pub const CUSTOMER_FIELD: &str = "customer";

/// Key of the customer identifier inside the customer sub-record
pub const CUSTOMER_ID_FIELD: &str = "id";

/// A decoded domain event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    fields: Map<String, Value>,
}

/// Decode a raw delivery payload into an [`Event`]
///
/// The payload must be UTF-8 encoded JSON with an object at the top level.
pub fn decode_event(payload: &[u8]) -> Result<Event> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| PersisterError::InvalidPayload(format!("payload is not UTF-8: {}", e)))?;

    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(Event { fields }),
        other => Err(PersisterError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

impl Event {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Extract the customer sub-record
    ///
    /// Returns `Ok(None)` when the `customer` key is absent or null.
    pub fn customer(&self) -> Result<Option<CustomerRecord>> {
        match self.fields.get(CUSTOMER_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(fields)) => CustomerRecord::from_fields(fields.clone()).map(Some),
            Some(other) => Err(PersisterError::InvalidCustomer(format!(
                "customer must be an object, got {}",
                json_type_name(other)
            ))),
        }
    }
}

/// Customer identifier, used verbatim as the store key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerId(String);

impl CustomerId {
    /// Build an identifier from the JSON value of the `id` field.
    /// Strings are used as-is, numbers in their JSON textual form.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s.is_empty() => Err(PersisterError::InvalidCustomer(
                "customer id is an empty string".to_string(),
            )),
            Value::String(s) => Ok(Self(s.clone())),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(PersisterError::InvalidCustomer(format!(
                "customer id must be a string or number, got {}",
                json_type_name(other)
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The customer sub-record of an event
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    id: CustomerId,
    fields: Map<String, Value>,
}

impl CustomerRecord {
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self> {
        let id = fields
            .get(CUSTOMER_ID_FIELD)
            .ok_or_else(|| PersisterError::InvalidCustomer("customer has no id".to_string()))
            .and_then(CustomerId::from_value)?;

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &CustomerId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize the record for storage: 2-space indented JSON with `,` and
    /// `: ` separators. Field order follows the incoming payload.
    pub fn to_store_value(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.fields)?)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
