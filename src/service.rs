//! The single orchestration point the HTTP layer calls: document lifecycle
//! plus on-demand JSON-LD transforms.

use std::str::FromStr;

use jiff::Timestamp;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::json_ld::{ContextResolver, LdEngine, TransformOp, TransformOptions};
use crate::store::{ContentType, DocKey, Document, DocumentRepo};

#[derive(Clone)]
pub(crate) struct DocumentService {
    repo: DocumentRepo,
    engine: LdEngine,
}

impl DocumentService {
    pub(crate) fn new(repo: DocumentRepo, resolver: ContextResolver) -> DocumentService {
        DocumentService {
            repo,
            engine: LdEngine::new(resolver),
        }
    }

    pub(crate) fn store(
        &self,
        content: Value,
        content_type: ContentType,
        ttl: Option<i64>,
        owner: Option<String>,
    ) -> Result<Document, Error> {
        if let Some(ttl) = ttl {
            if ttl <= 0 {
                return Err(Error::malformed("ttl must be a positive number of seconds"));
            }
        }
        let document = self
            .repo
            .create(&content, content_type, unix_now(), ttl, owner)
            .map_err(Error::StoreUnavailable)?;
        debug!(target: "docs", id = %document.id, ?content_type, "stored document");
        Ok(document)
    }

    /// A document whose expiry has passed is absent from the client's point
    /// of view, whether or not the sweep has reaped it yet.
    pub(crate) fn fetch(&self, id: &str) -> Result<Document, Error> {
        let key = parse_handle(id)?;
        let document = self
            .repo
            .find_one(key)
            .map_err(Error::StoreUnavailable)?
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        if document.is_expired(unix_now()) {
            return Err(Error::NotFound(id.to_owned()));
        }
        Ok(document)
    }

    pub(crate) async fn fetch_transformed(
        &self,
        id: &str,
        op: TransformOp,
        options: &TransformOptions,
    ) -> Result<Value, Error> {
        let document = self.fetch(id)?;
        if document.content_type != ContentType::JsonLd {
            return Err(Error::UnsupportedOperation(format!(
                "document {id} is not JSON-LD"
            )));
        }
        self.engine.transform(&document.content, op, options).await
    }

    pub(crate) fn replace(
        &self,
        id: &str,
        content: Value,
        ttl: Option<i64>,
        principal: Option<&str>,
    ) -> Result<Document, Error> {
        if let Some(ttl) = ttl {
            if ttl <= 0 {
                return Err(Error::malformed("ttl must be a positive number of seconds"));
            }
        }
        let existing = self.fetch(id)?;
        check_ownership(&existing, principal)?;
        let updated = self
            .repo
            .update(existing.id, &content, unix_now(), ttl)
            .map_err(Error::StoreUnavailable)?
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        debug!(target: "docs", id = %updated.id, "replaced document content");
        Ok(updated)
    }

    pub(crate) fn remove(&self, id: &str, principal: Option<&str>) -> Result<(), Error> {
        let existing = self.fetch(id)?;
        check_ownership(&existing, principal)?;
        if !self
            .repo
            .delete(existing.id)
            .map_err(Error::StoreUnavailable)?
        {
            return Err(Error::NotFound(id.to_owned()));
        }
        debug!(target: "docs", id = %existing.id, "removed document");
        Ok(())
    }
}

fn check_ownership(document: &Document, principal: Option<&str>) -> Result<(), Error> {
    match &document.owner {
        Some(owner) if principal != Some(owner.as_str()) => Err(Error::Unauthorized),
        _ => Ok(()),
    }
}

/// Handles are opaque; anything that does not parse back into a key simply
/// does not name a document.
fn parse_handle(id: &str) -> Result<DocKey, Error> {
    DocKey::from_str(id).map_err(|_| Error::NotFound(id.to_owned()))
}

pub(crate) fn unix_now() -> i64 {
    Timestamp::now().as_second()
}
