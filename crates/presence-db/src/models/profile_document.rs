//! Profile document database model

use chrono::{DateTime, Utc};
use presence_core::Document;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// Database model for the profile_documents table
#[derive(Debug, Clone, FromRow)]
pub struct ProfileDocumentModel {
    pub collection: String,
    pub document_id: String,
    pub fields: Json<Value>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDocumentModel {
    /// Stored fields as a document; a non-object column reads as empty
    pub fn into_document(self) -> Document {
        match self.fields.0 {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}
