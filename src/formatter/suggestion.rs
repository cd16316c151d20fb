use serde::{Deserialize, Serialize};

use super::style::PromptTextStyle;
use crate::model::UserStatus;

/// A candidate entity offered while composing, e.g. one row of the @mention picker.
///
/// Built once per search result and never modified afterwards; a new search
/// replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    /// What the user sees once the item is inserted, e.g. `@Ann`.
    pub prompt_text: String,
    /// What is sent over the wire in place of `prompt_text`, e.g. `<@uid:42>`.
    pub underlying_text: String,
    /// The backing entity as the directory returned it.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text_style: Option<PromptTextStyle>,
}

impl SuggestionItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        prompt_text: impl Into<String>,
        underlying_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            status: UserStatus::default(),
            prompt_text: prompt_text.into(),
            underlying_text: underlying_text.into(),
            data: serde_json::Value::Null,
            prompt_text_style: None,
        }
    }

    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_style(mut self, style: Option<PromptTextStyle>) -> Self {
        self.prompt_text_style = style;
        self
    }
}
