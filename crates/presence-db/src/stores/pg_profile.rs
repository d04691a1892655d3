//! PostgreSQL implementation of ProfileStore

use async_trait::async_trait;
use presence_core::{Document, FieldValue, ProfilePatch, ProfileStore, StoreResult};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::instrument;

use super::error::map_db_error;
use crate::models::ProfileDocumentModel;

/// Documents live in one JSONB column keyed by (collection, document_id)
const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS profile_documents (
        collection  TEXT        NOT NULL,
        document_id TEXT        NOT NULL,
        fields      JSONB       NOT NULL DEFAULT '{}'::jsonb,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, document_id)
    )
";

/// PostgreSQL implementation of ProfileStore
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Create a new PgProfileStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it does not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        tracing::debug!("profile_documents schema ensured");
        Ok(())
    }
}

/// Split a patch into literal fields and fields stamped by the database clock
fn split_patch(patch: &ProfilePatch) -> (Map<String, Value>, Vec<String>) {
    let mut literal = Map::new();
    let mut stamped = Vec::new();
    for (field, value) in patch.iter() {
        match value {
            FieldValue::Value(v) => {
                literal.insert(field.to_string(), v.clone());
            }
            FieldValue::ServerTimestamp => stamped.push(field.to_string()),
        }
    }
    (literal, stamped)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    #[instrument(skip(self, patch))]
    async fn merge_write(
        &self,
        collection: &str,
        document_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<()> {
        let (literal, stamped) = split_patch(patch);

        sqlx::query(
            r"
            INSERT INTO profile_documents (collection, document_id, fields, updated_at)
            SELECT $1, $2,
                   $3::jsonb || COALESCE(
                       (SELECT jsonb_object_agg(f, to_jsonb(now())) FROM unnest($4::text[]) AS f),
                       '{}'::jsonb
                   ),
                   now()
            ON CONFLICT (collection, document_id) DO UPDATE
            SET fields = profile_documents.fields || EXCLUDED.fields,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(collection)
        .bind(document_id)
        .bind(Json(Value::Object(literal)))
        .bind(&stamped)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> StoreResult<Option<Document>> {
        let result = sqlx::query_as::<_, ProfileDocumentModel>(
            r"
            SELECT collection, document_id, fields, updated_at
            FROM profile_documents
            WHERE collection = $1 AND document_id = $2
            ",
        )
        .bind(collection)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(ProfileDocumentModel::into_document))
    }
}
