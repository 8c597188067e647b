use anyhow::Result;
use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle};

use super::DocKey;

/// Secondary index of documents by expiry time. Keys are the big-endian
/// expiry timestamp followed by the raw id bytes, so one sweep is a single
/// range scan up to the cutoff.
#[derive(Clone)]
pub(super) struct ExpiryIndex {
    entries: PartitionHandle,
}

impl ExpiryIndex {
    pub(super) fn new(keyspace: &Keyspace) -> Result<ExpiryIndex> {
        let entries = keyspace.open_partition("doc_expiry", PartitionCreateOptions::default())?;
        Ok(ExpiryIndex { entries })
    }
    pub(super) fn insert(&self, batch: &mut Batch, expires_at: i64, id: DocKey) {
        batch.insert(&self.entries, index_key(expires_at, id), id.as_ref());
    }
    pub(super) fn remove(&self, batch: &mut Batch, expires_at: i64, id: DocKey) {
        batch.remove(&self.entries, index_key(expires_at, id));
    }
    /// All ids whose expiry timestamp is at or before `as_of`.
    pub(super) fn list_expired(&self, as_of: i64) -> Result<Vec<DocKey>> {
        let upper = (as_of + 1).to_be_bytes();
        let mut ids = vec![];
        for item in self.entries.range(..upper.as_slice()) {
            let (_, value) = item?;
            ids.push(DocKey::try_from(value.as_ref())?);
        }
        Ok(ids)
    }
}

fn index_key(expires_at: i64, id: DocKey) -> Vec<u8> {
    let mut key = vec![];
    key.extend_from_slice(&expires_at.to_be_bytes());
    key.extend_from_slice(id.as_ref());
    key
}
