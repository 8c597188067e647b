mod doc_key;
mod document;
mod document_repo;
mod expiry_index;

pub(crate) use doc_key::DocKey;
pub(crate) use document::{ContentType, Document};
pub(crate) use document_repo::DocumentRepo;
