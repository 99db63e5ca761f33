//! Idle/Loading/Error signal observed by the UI.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum NetworkState {
    Idle,
    Loading,
    Error(String),
}

impl NetworkState {
    pub fn is_loading(&self) -> bool {
        matches!(self, NetworkState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NetworkState::Error(_))
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NetworkState::Idle => write!(f, "idle"),
            NetworkState::Loading => write!(f, "loading"),
            NetworkState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

pub struct NetworkStatus {
    state: watch::Sender<NetworkState>,
}

impl NetworkStatus {
    pub fn new() -> Self {
        let (state, _) = watch::channel(NetworkState::Idle);
        NetworkStatus { state }
    }

    pub fn current(&self) -> NetworkState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    pub(crate) fn set(&self, next: NetworkState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Reset an acknowledged error back to idle. Returns whether anything changed.
    pub fn clear_error(&self) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_error() {
                *current = NetworkState::Idle;
                return true;
            }
            false
        })
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        NetworkStatus::new()
    }
}
