use anyhow::Result;
use fjall::{Keyspace, KvSeparationOptions, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde_json::Value;

use super::document::DocumentRecord;
use super::expiry_index::ExpiryIndex;
use super::{ContentType, DocKey, Document};

/// Durable id to document mapping plus the expiry index used by the sweep.
///
/// Callers supply `now` so expiry bookkeeping stays consistent across
/// restarts and is easy to pin down in tests.
#[derive(Clone)]
pub(crate) struct DocumentRepo {
    keyspace: Keyspace,
    documents: PartitionHandle,
    expiry: ExpiryIndex,
}

impl DocumentRepo {
    pub(crate) fn new(keyspace: Keyspace) -> Result<DocumentRepo> {
        let documents = keyspace.open_partition(
            "documents",
            PartitionCreateOptions::default()
                .compression(fjall::CompressionType::Lz4)
                .with_kv_separation(KvSeparationOptions::default()),
        )?;
        let expiry = ExpiryIndex::new(&keyspace)?;
        Ok(DocumentRepo {
            keyspace,
            documents,
            expiry,
        })
    }

    pub(crate) fn create(
        &self,
        content: &Value,
        content_type: ContentType,
        now: i64,
        ttl: Option<i64>,
        owner: Option<String>,
    ) -> Result<Document> {
        let id = DocKey::new();
        let expires_at = ttl.map(|ttl| now + ttl);
        let record = DocumentRecord::new(content, content_type, now, expires_at, owner)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.documents, id, record.to_bytes()?);
        if let Some(expires_at) = record.expires_at {
            self.expiry.insert(&mut batch, expires_at, id);
        }
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        record.into_document(id)
    }

    pub(crate) fn find_one(&self, id: DocKey) -> Result<Option<Document>> {
        if let Some(bytes) = self.documents.get(id)? {
            let record = DocumentRecord::from_bytes(&bytes)?;
            return Ok(Some(record.into_document(id)?));
        }
        Ok(None)
    }

    /// Replace the content of an existing document. Id, creation time, owner
    /// and content type are untouched; a new ttl refreshes the expiry from
    /// `now`, while `None` keeps the current one.
    pub(crate) fn update(
        &self,
        id: DocKey,
        content: &Value,
        now: i64,
        ttl: Option<i64>,
    ) -> Result<Option<Document>> {
        let Some(bytes) = self.documents.get(id)? else {
            return Ok(None);
        };
        let old = DocumentRecord::from_bytes(&bytes)?;
        let expires_at = match ttl {
            Some(ttl) => Some(now + ttl),
            None => old.expires_at,
        };
        let record = DocumentRecord::new(
            content,
            old.content_type,
            old.created_at,
            expires_at,
            old.owner.clone(),
        )?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.documents, id, record.to_bytes()?);
        if old.expires_at != record.expires_at {
            if let Some(old_expiry) = old.expires_at {
                self.expiry.remove(&mut batch, old_expiry, id);
            }
            if let Some(new_expiry) = record.expires_at {
                self.expiry.insert(&mut batch, new_expiry, id);
            }
        }
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        record.into_document(id).map(Some)
    }

    /// Returns false when the id is already gone, which a concurrent sweep
    /// or client delete makes perfectly normal.
    pub(crate) fn delete(&self, id: DocKey) -> Result<bool> {
        let Some(bytes) = self.documents.get(id)? else {
            return Ok(false);
        };
        let record = DocumentRecord::from_bytes(&bytes)?;
        let mut batch = self.keyspace.batch();
        batch.remove(&self.documents, id);
        if let Some(expires_at) = record.expires_at {
            self.expiry.remove(&mut batch, expires_at, id);
        }
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(true)
    }

    pub(crate) fn list_expired(&self, as_of: i64) -> Result<Vec<DocKey>> {
        self.expiry.list_expired(as_of)
    }
}
