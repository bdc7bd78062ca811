//! Raw upstream payloads and their normalization into [`Record`]s.

use crate::upstream::MaxId;
use murmur_core::{Record, parse_created_at};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author block of an upstream item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    /// Handle without the leading `@`.
    #[serde(default)]
    pub screen_name: Option<String>,
}

/// An upstream item as delivered by search pages or the live stream.
///
/// Only the fields this crate reads are typed; everything else is kept in
/// `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_str: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RawUser>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawItem {
    /// Build an item from its commonly used fields.
    pub fn new(
        id: impl Into<String>,
        created_at: impl Into<String>,
        screen_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id_str: Some(id.into()),
            created_at: Some(created_at.into()),
            user: Some(RawUser {
                screen_name: Some(screen_name.into()),
            }),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Parse an item from upstream JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The pagination id of this item.
    ///
    /// Prefers the string form so ids are never routed through a lossy
    /// numeric representation.
    pub fn cursor_id(&self) -> Option<MaxId> {
        match (&self.id_str, self.id) {
            (Some(id), _) if !id.is_empty() => Some(MaxId::new(id.clone())),
            (_, Some(id)) => Some(MaxId::new(id.to_string())),
            _ => None,
        }
    }

    fn screen_name(&self) -> Option<&str> {
        self.user.as_ref()?.screen_name.as_deref()
    }
}

/// Convert a raw item into a [`Record`], or `None` if it is unusable.
///
/// An item is unusable when its creation time is missing or unparseable, or
/// when it carries no author handle. Dropping is silent: this is not an error
/// condition for the caller.
pub fn normalize(item: &RawItem) -> Option<Record> {
    let time = parse_created_at(item.created_at.as_deref()?).ok()?;
    let handle = item.screen_name()?;
    let text = item.text.clone().unwrap_or_default();

    Some(Record::new(time, format!("@{handle}"), text))
}
