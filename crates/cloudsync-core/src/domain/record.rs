//! Record entities
//!
//! Records are the unit of data stored in a zone. The engine treats their
//! fields as opaque JSON; only the id, the type and the change tag carry
//! meaning for synchronization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::newtypes::RecordId;

/// A record stored in the remote zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record name, unique within the zone
    id: RecordId,
    /// Application-defined record type
    record_type: String,
    /// Server version marker; `None` for records never saved
    change_tag: Option<String>,
    /// Field values
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Record {
    /// Creates a new record with no fields and no change tag
    ///
    /// # Arguments
    ///
    /// * `id` - The record name
    /// * `record_type` - Application-defined record type
    pub fn new(id: RecordId, record_type: impl Into<String>) -> Self {
        Self {
            id,
            record_type: record_type.into(),
            change_tag: None,
            fields: Map::new(),
        }
    }

    /// Returns the record id
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the record type
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Returns the change tag if the record was ever saved
    pub fn change_tag(&self) -> Option<&str> {
        self.change_tag.as_deref()
    }

    /// Returns all field values
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a single field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets the change tag
    pub fn with_change_tag(mut self, change_tag: impl Into<String>) -> Self {
        self.change_tag = Some(change_tag.into());
        self
    }

    /// Sets a field value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets a field value in place
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Replaces the change tag in place
    pub fn set_change_tag(&mut self, change_tag: Option<String>) {
        self.change_tag = change_tag;
    }

    /// Replaces every field with the fields of `other`
    ///
    /// Id, type and change tag of `self` are kept, so copying local edits onto
    /// a server version produces a record the server will accept.
    pub fn copy_fields(&mut self, other: &Record) {
        self.fields = other.fields.clone();
    }

    /// Removes every field
    pub fn remove_all_fields(&mut self) {
        self.fields.clear();
    }
}

/// One record rejected by the server during a modify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordConflict {
    /// The record as submitted by this client
    pub client: Record,
    /// The server's current version, when the server reported one
    pub server: Option<Record>,
}

impl RecordConflict {
    /// Creates a new RecordConflict
    pub fn new(client: Record, server: Option<Record>) -> Self {
        Self { client, server }
    }

    /// Returns the id of the conflicting record
    pub fn record_id(&self) -> &RecordId {
        self.client.id()
    }
}

/// Query used by fetch-records operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Record type to match
    pub record_type: String,
    /// Optional backend predicate, passed through untouched
    pub predicate: Option<String>,
}

impl RecordQuery {
    /// Creates a query matching every record of a type
    pub fn all(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            predicate: None,
        }
    }

    /// Sets the predicate
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(id: &str) -> Record {
        Record::new(id.parse().unwrap(), "Note")
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = note("n1");
        assert_eq!(record.record_type(), "Note");
        assert!(record.change_tag().is_none());
        assert!(record.fields().is_empty());
    }

    #[test]
    fn test_copy_fields_keeps_identity_and_tag() {
        let local = note("n1").with_field("title", "local edit");
        let mut server = note("n1")
            .with_change_tag("tag-7")
            .with_field("title", "server edit")
            .with_field("pinned", true);

        server.copy_fields(&local);

        assert_eq!(server.change_tag(), Some("tag-7"));
        assert_eq!(server.field("title"), Some(&json!("local edit")));
        assert!(server.field("pinned").is_none());
    }

    #[test]
    fn test_remove_all_fields() {
        let mut record = note("n1").with_field("a", 1).with_field("b", 2);
        record.remove_all_fields();
        assert!(record.fields().is_empty());
        assert_eq!(record.id().as_str(), "n1");
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let record = note("n1").with_change_tag("t1").with_field("body", "hello");
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_query_builder() {
        let query = RecordQuery::all("Note").with_predicate("pinned == 1");
        assert_eq!(query.record_type, "Note");
        assert_eq!(query.predicate.as_deref(), Some("pinned == 1"));
    }
}
