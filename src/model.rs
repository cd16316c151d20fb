//! The chat entities the formatters read from.
//!
//! These mirror the handful of fields the external chat SDK exposes on its
//! user, group and message objects. Everything else about those objects
//! (delivery, receipts, presence updates) is owned by the SDK.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
}

/// A user known to the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
}

impl User {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            avatar: None,
            status: UserStatus::default(),
        }
    }

    /// The name to show for this user, falling back to the uid when the
    /// display name is blank.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() { &self.uid } else { trimmed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub guid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Group {
    pub fn new(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self { guid: guid.into(), name: name.into(), avatar: None }
    }
}

/// The role a member holds within a group.
///
/// The ordering is used when ranking suggestions: admins first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberScope {
    Admin,
    Moderator,
    #[default]
    Participant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub scope: MemberScope,
}

impl GroupMember {
    pub fn new(user: User, scope: MemberScope) -> Self {
        Self { user, scope }
    }
}

/// The conversation a composer or message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationTarget {
    User(User),
    Group(Group),
}

impl ConversationTarget {
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::User(_) => None,
        }
    }
}

/// A text message as handed to the formatters.
///
/// `text` may contain encoded mention tokens; `mentioned_users` carries the
/// resolved entity for each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ConversationTarget>,
    pub text: String,
    #[serde(default)]
    pub mentioned_users: Vec<User>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: 0,
            sender: None,
            receiver: None,
            text: text.into(),
            mentioned_users: Vec::new(),
        }
    }

    pub fn with_mentions(mut self, mentioned_users: Vec<User>) -> Self {
        self.mentioned_users = mentioned_users;
        self
    }

    pub fn mentioned_user(&self, uid: &str) -> Option<&User> {
        self.mentioned_users.iter().find(|user| user.uid == uid)
    }
}
