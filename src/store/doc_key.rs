use std::fmt::Display;
use std::str::FromStr;

use fjall::UserKey;
use uuid::Uuid;

/// Opaque document handle. UUIDv7 underneath, so keys created later sort
/// later in the primary partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DocKey(Uuid);

impl DocKey {
    pub(crate) fn new() -> DocKey {
        DocKey(Uuid::now_v7())
    }
}

impl From<DocKey> for UserKey {
    fn from(value: DocKey) -> Self {
        UserKey::new(value.0.as_bytes())
    }
}

impl AsRef<[u8]> for DocKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.as_simple().fmt(f)
    }
}

impl FromStr for DocKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DocKey(Uuid::try_parse(s)?))
    }
}

impl TryFrom<&[u8]> for DocKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(DocKey(Uuid::from_bytes(value.try_into()?)))
    }
}
