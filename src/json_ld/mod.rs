//! Just enough JSON-LD: expansion, compaction and framing for stored
//! documents, with remote contexts dereferenced over the network.

use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;

mod compact;
mod context;
mod expand;
mod frame;
mod resolver;

pub(crate) use resolver::ContextResolver;

use self::context::{ActiveContext, active_context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransformOp {
    Expand,
    Compact,
    Frame,
}

impl FromStr for TransformOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expand" => Ok(TransformOp::Expand),
            "compact" => Ok(TransformOp::Compact),
            "frame" => Ok(TransformOp::Frame),
            other => Err(Error::UnsupportedOperation(format!(
                "unknown transform {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TransformOptions {
    pub(crate) context: Option<Value>,
    pub(crate) frame: Option<Value>,
}

/// Applies expand/compact/frame to document content. Apart from the
/// resolver's cache there is no state here: identical inputs with identical
/// resolver responses produce identical output.
#[derive(Clone)]
pub(crate) struct LdEngine {
    resolver: ContextResolver,
}

impl LdEngine {
    pub(crate) fn new(resolver: ContextResolver) -> LdEngine {
        LdEngine { resolver }
    }

    pub(crate) async fn transform(
        &self,
        content: &Value,
        op: TransformOp,
        options: &TransformOptions,
    ) -> Result<Value, Error> {
        match op {
            TransformOp::Expand => {
                let active = self.document_context(content).await?;
                expand::expand(content, &active)
            }
            TransformOp::Compact => {
                let context_value = options
                    .context
                    .as_ref()
                    .ok_or_else(|| Error::malformed("compaction requires a context"))?;
                let active = self.document_context(content).await?;
                let expanded = expand::expand(content, &active)?;
                let target = active_context(&self.resolver, context_value).await?;
                compact::compact(&expanded, &target, context_value)
            }
            TransformOp::Frame => {
                let frame_doc = options
                    .frame
                    .as_ref()
                    .ok_or_else(|| Error::malformed("framing requires a frame"))?;
                let active = self.document_context(content).await?;
                let expanded = expand::expand(content, &active)?;
                let frame_context_value = frame_doc.get("@context");
                let frame_active = match frame_context_value {
                    Some(def) => active_context(&self.resolver, def).await?,
                    None => ActiveContext::default(),
                };
                frame::frame(&expanded, frame_doc, &frame_active, frame_context_value)
            }
        }
    }

    async fn document_context(&self, content: &Value) -> Result<ActiveContext, Error> {
        match content.get("@context") {
            Some(def) => active_context(&self.resolver, def).await,
            None => Ok(ActiveContext::default()),
        }
    }
}
