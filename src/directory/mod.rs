//! The user and group-member lookup APIs the formatters search through.
//!
//! The chat SDK owns the actual directory; formatters only see it through the
//! [`Directory`] trait, one paginated request at a time.

pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::model::{GroupMember, User};
pub use in_memory::InMemoryDirectory;

/// Which roster a request searches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryScope {
    /// The global user directory.
    Users,
    /// The members of one group.
    GroupMembers { guid: String },
}

/// One page of a keyword-filtered directory search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRequest {
    pub scope: DirectoryScope,
    /// `None` lists everyone.
    pub keyword: Option<String>,
    pub limit: usize,
    /// Zero-based page index.
    pub page: u32,
}

impl DirectoryRequest {
    pub fn new(scope: DirectoryScope, keyword: Option<String>, limit: usize) -> Self {
        Self { scope, keyword, limit, page: 0 }
    }

    /// The request for the page after this one.
    pub fn next_page(&self) -> Self {
        Self { page: self.page + 1, ..self.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryEntry {
    User(User),
    GroupMember(GroupMember),
}

impl DirectoryEntry {
    pub fn user(&self) -> &User {
        match self {
            Self::User(user) => user,
            Self::GroupMember(member) => &member.user,
        }
    }

    /// The raw entity, as attached to a suggestion item.
    pub fn to_json(&self) -> serde_json::Value {
        let result = match self {
            Self::User(user) => serde_json::to_value(user),
            Self::GroupMember(member) => serde_json::to_value(member),
        };
        result.unwrap_or_else(|e| {
            tracing::error!("Failed to serialize directory entry {}: {e}", self.user().uid);
            serde_json::Value::Null
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPage {
    pub entries: Vec<DirectoryEntry>,
    /// Whether a request for the next page may return more entries.
    pub has_more: bool,
}

/// A paginated, keyword-filterable directory of users and group members.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn fetch(&self, request: DirectoryRequest) -> Result<DirectoryPage, DirectoryError>;
}
