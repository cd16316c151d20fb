//! The explicitly owned session context shared by all formatters of one logged-in user.
//!
//! It holds what the chat SDK would otherwise expose through global
//! accessors: who is logged in, where to search, which runtime to run
//! lookups on, and how to wake the UI thread when a result lands.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::directory::Directory;
use crate::model::User;

/// Wakes the host UI event loop so it calls `process_search_updates()`.
///
/// Invoked from whatever thread a lookup completes on.
pub type UiSignal = Arc<dyn Fn() + Send + Sync>;

pub struct ChatSession {
    logged_in_user: User,
    directory: Arc<dyn Directory>,
    runtime: Handle,
    ui_signal: Option<UiSignal>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("logged_in_user", &self.logged_in_user.uid)
            .field("has_ui_signal", &self.ui_signal.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(logged_in_user: User, directory: Arc<dyn Directory>, runtime: Handle) -> Self {
        Self { logged_in_user, directory, runtime, ui_signal: None }
    }

    pub fn with_ui_signal(mut self, signal: UiSignal) -> Self {
        self.ui_signal = Some(signal);
        self
    }

    pub fn logged_in_user(&self) -> &User {
        &self.logged_in_user
    }

    /// Whether `uid` is the logged-in user.
    pub fn is_logged_in_user(&self, uid: &str) -> bool {
        self.logged_in_user.uid == uid
    }

    pub fn directory(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn signal_ui(&self) {
        if let Some(signal) = &self.ui_signal {
            signal();
        }
    }
}
