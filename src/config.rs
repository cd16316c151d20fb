//! Configuration for the mentions formatter, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FormatterError;
use crate::formatter::Theme;
use crate::mentions::search::{DEFAULT_MENTION_LIMIT, DEFAULT_PAGE_SIZE, MentionRequestType, MentionsVisibility};
use crate::mentions::styles::MentionStyleOverrides;

/// Every field is optional in the JSON form; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionsConfig {
    pub trigger: char,
    /// How many mentions one message may carry.
    pub mention_limit: usize,
    pub page_size: usize,
    pub request_type: MentionRequestType,
    pub visibility: MentionsVisibility,
    /// Replaces the default "you can add up to N mentions" text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_info_text: Option<String>,
    pub theme: Theme,
    pub styles: MentionStyleOverrides,
}

impl Default for MentionsConfig {
    fn default() -> Self {
        Self {
            trigger: '@',
            mention_limit: DEFAULT_MENTION_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            request_type: MentionRequestType::default(),
            visibility: MentionsVisibility::default(),
            limit_info_text: None,
            theme: Theme::default(),
            styles: MentionStyleOverrides::default(),
        }
    }
}

impl MentionsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, FormatterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormatterError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| FormatterError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded mentions config from {path:?}");
        Ok(config)
    }
}
