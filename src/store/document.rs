//! Storage friendly representation of a kept document.

use anyhow::{Context, Result};
use minicbor::{Decode, Encode};
use serde_json::Value;

use super::DocKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cbor(index_only)]
pub(crate) enum ContentType {
    #[n(0)]
    Json,
    #[n(1)]
    JsonLd,
}

/// On-disk record. Content is kept as serialized JSON so the record codec
/// stays oblivious to the document shape.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct DocumentRecord {
    #[n(0)]
    pub(crate) content: Vec<u8>,
    #[n(1)]
    pub(crate) content_type: ContentType,
    #[n(2)]
    pub(crate) created_at: i64,
    #[n(3)]
    pub(crate) expires_at: Option<i64>,
    #[n(4)]
    pub(crate) owner: Option<String>,
}

impl DocumentRecord {
    pub(crate) fn new(
        content: &Value,
        content_type: ContentType,
        created_at: i64,
        expires_at: Option<i64>,
        owner: Option<String>,
    ) -> Result<DocumentRecord> {
        Ok(DocumentRecord {
            content: serde_json::to_vec(content).context("unable to serialize document content")?,
            content_type,
            created_at,
            expires_at,
            owner,
        })
    }
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).context("unable to encode document record")
    }
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<DocumentRecord> {
        minicbor::decode(bytes).context("unable to decode document record")
    }
    pub(crate) fn into_document(self, id: DocKey) -> Result<Document> {
        let content =
            serde_json::from_slice(&self.content).context("unable to parse stored content")?;
        Ok(Document {
            id,
            content,
            content_type: self.content_type,
            created_at: self.created_at,
            expires_at: self.expires_at,
            owner: self.owner,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Document {
    pub(crate) id: DocKey,
    pub(crate) content: Value,
    pub(crate) content_type: ContentType,
    pub(crate) created_at: i64,
    pub(crate) expires_at: Option<i64>,
    pub(crate) owner: Option<String>,
}

impl Document {
    pub(crate) fn is_expired(&self, as_of: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= as_of)
    }
}
