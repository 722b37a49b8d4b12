use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON:API resource object returned by the module endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub module: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

impl Record {
    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute value as a string, when it is one
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(Value::as_str)
    }
}

/// Pagination metadata of a list response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "total-pages", default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response document of a module listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDocument {
    pub data: Vec<Record>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

impl ListDocument {
    pub fn total_pages(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.total_pages)
    }
}

/// Payload for record creation and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(rename = "type")]
    pub module: String,
    pub id: String,
    pub attributes: Value,
}

/// Payload linking a record to a related record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRef {
    #[serde(rename = "type")]
    pub module: String,
    pub id: String,
}
