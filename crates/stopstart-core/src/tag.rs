//! The tag predicate scoping which instances are managed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Maximum tag key length accepted by EC2.
pub const MAX_TAG_KEY_LEN: usize = 128;

/// Maximum tag value length accepted by EC2.
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// An immutable `(key, value)` tag pair.
///
/// Supplied once per deployment; instances carrying exactly this tag are
/// the only ones the controller will ever touch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTag")]
pub struct TagPredicate {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct RawTag {
    key: String,
    value: String,
}

impl TryFrom<RawTag> for TagPredicate {
    type Error = CoreError;

    fn try_from(raw: RawTag) -> Result<Self> {
        Self::new(raw.key, raw.value)
    }
}

impl TagPredicate {
    /// Build a tag predicate.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTag` if the key or value is empty or longer
    /// than EC2 allows.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let value = value.into();

        if key.trim().is_empty() {
            return Err(CoreError::InvalidTag("tag key is empty".to_string()));
        }
        if value.is_empty() {
            return Err(CoreError::InvalidTag(format!(
                "tag value for key {key:?} is empty"
            )));
        }
        if key.chars().count() > MAX_TAG_KEY_LEN {
            return Err(CoreError::InvalidTag(format!(
                "tag key exceeds {MAX_TAG_KEY_LEN} characters"
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(CoreError::InvalidTag(format!(
                "tag value exceeds {MAX_TAG_VALUE_LEN} characters"
            )));
        }

        Ok(Self { key, value })
    }

    /// The tag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Backend filter name for this tag (`tag:<key>`).
    #[must_use]
    pub fn filter_name(&self) -> String {
        format!("tag:{}", self.key)
    }
}

impl fmt::Display for TagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
