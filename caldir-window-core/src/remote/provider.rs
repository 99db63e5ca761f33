//! Provider subprocess protocol.
//!
//! A provider is an external binary (e.g., `caldir-provider-google`) spoken
//! to with one JSON request on stdin and one JSON response on stdout. The
//! same binary serves as the remote source and as the token source.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::auth::{Auth, AuthState, Token};
use crate::config::RemoteSettings;
use crate::date_range::DateRange;
use crate::error::{SyncError, SyncResult};
use crate::event::EventRecord;
use crate::remote::RemoteSource;
use crate::remote::protocol::{
    AccessToken, Command, CreateEvent, DeleteEvent, ListEvents, ProviderCommand, Request, Response,
    UpdateEvent,
};
use crate::settings::Settings;

/// Bounds the subprocess round-trip, not the sync cycle.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Provider {
    name: String,
    binary: Option<PathBuf>,
}

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider {
            name: name.to_string(),
            binary: None,
        }
    }

    /// Use `path` instead of looking up `caldir-provider-{name}` on PATH.
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn binary_name(&self) -> String {
        format!("caldir-provider-{}", self.name)
    }

    /// Resolves the binary on every call; callers on a hot path should cache the answer.
    pub fn is_installed(&self) -> bool {
        self.binary_path().is_ok()
    }

    fn binary_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.binary {
            return match path.is_file() {
                true => Ok(path.clone()),
                false => Err(SyncError::ProviderNotInstalled(path.display().to_string())),
            };
        }

        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| SyncError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> SyncResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                SyncError::Transport(format!(
                    "Provider '{}' timed out after {}s",
                    self.name,
                    PROVIDER_TIMEOUT.as_secs()
                ))
            })?
    }

    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> SyncResult<R> {
        let params =
            serde_json::to_value(params).map_err(|e| SyncError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json =
            serde_json::to_string(&request).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.name, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SyncError::Transport(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SyncError::Transport("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to write to provider: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read provider output: {}", e)))?;

        if !output.status.success() {
            return Err(SyncError::Transport(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(SyncError::Transport("Provider returned no response".into()));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| SyncError::Transport(format!("Failed to parse response: {}", e)))?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(SyncError::Transport(error)),
        }
    }
}

/// A remote calendar reached through a provider binary.
pub struct ProviderRemote {
    provider: Provider,
    remote_config: serde_json::Map<String, serde_json::Value>,
    settings: Arc<dyn Settings>,
}

impl ProviderRemote {
    pub fn new(remote: &RemoteSettings, settings: Arc<dyn Settings>) -> Self {
        ProviderRemote {
            provider: Provider::from_name(&remote.provider),
            remote_config: serde_json::Map::from(remote),
            settings,
        }
    }

    fn rfc3339_bounds(&self, range: &DateRange) -> (String, String) {
        let (from, to) = range.millis_bounds(self.settings.current_time_zone());
        (millis_to_rfc3339(from), millis_to_rfc3339(to))
    }
}

fn millis_to_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl RemoteSource for ProviderRemote {
    async fn fetch_events(&self, range: &DateRange, token: &Token) -> SyncResult<Vec<EventRecord>> {
        let (from, to) = self.rfc3339_bounds(range);
        self.provider
            .call(ListEvents {
                remote_config: self.remote_config.clone(),
                access_token: token.as_str().to_string(),
                from,
                to,
            })
            .await
    }

    async fn create_event(&self, event: &EventRecord, token: &Token) -> SyncResult<EventRecord> {
        self.provider
            .call(CreateEvent {
                remote_config: self.remote_config.clone(),
                access_token: token.as_str().to_string(),
                event: event.clone(),
            })
            .await
    }

    async fn update_event(&self, event: &EventRecord, token: &Token) -> SyncResult<EventRecord> {
        self.provider
            .call(UpdateEvent {
                remote_config: self.remote_config.clone(),
                access_token: token.as_str().to_string(),
                event: event.clone(),
            })
            .await
    }

    async fn delete_event(&self, event_id: &str, token: &Token) -> SyncResult<()> {
        self.provider
            .call(DeleteEvent {
                remote_config: self.remote_config.clone(),
                access_token: token.as_str().to_string(),
                event_id: event_id.to_string(),
            })
            .await
    }
}

/// Token source backed by the same provider binary.
///
/// Providers manage their own credentials; signed in means the provider is
/// installed and configured for an account.
pub struct ProviderAuth {
    provider: Provider,
    remote_config: serde_json::Map<String, serde_json::Value>,
    account: Option<String>,
    installed: bool,
}

impl ProviderAuth {
    /// Resolves the provider binary once; install it and restart to sign in.
    pub fn new(remote: &RemoteSettings) -> Self {
        Self::with_provider(Provider::from_name(&remote.provider), remote)
    }

    pub fn with_provider(provider: Provider, remote: &RemoteSettings) -> Self {
        let installed = provider.is_installed();
        if !installed {
            debug!(provider = %provider.name(), "provider binary not found, treating as signed out");
        }

        ProviderAuth {
            provider,
            remote_config: serde_json::Map::from(remote),
            account: remote.account_identifier().map(String::from),
            installed,
        }
    }
}

#[async_trait]
impl Auth for ProviderAuth {
    fn current_auth_state(&self) -> AuthState {
        if self.installed {
            AuthState::signed_in(self.account.clone())
        } else {
            AuthState::signed_out()
        }
    }

    async fn fresh_token(&self) -> Option<Token> {
        let result = self
            .provider
            .call(AccessToken {
                remote_config: self.remote_config.clone(),
            })
            .await;

        match result {
            Ok(token) => token.map(Token::new),
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "could not obtain access token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StaticSettings;
    use chrono::NaiveDate;

    fn remote_settings() -> RemoteSettings {
        RemoteSettings {
            provider: "definitely-not-installed".into(),
            params: [(
                "definitely-not-installed_account".to_string(),
                toml::Value::String("me@example.com".into()),
            )]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_bounds_are_rendered_in_utc() {
        let remote = ProviderRemote::new(
            &remote_settings(),
            Arc::new(StaticSettings::new(chrono_tz::Europe::Oslo)),
        );
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let (from, to) = remote.rfc3339_bounds(&DateRange::single(day));
        assert_eq!(from, "2025-05-31T22:00:00.000Z");
        assert_eq!(to, "2025-06-01T21:59:59.999Z");
    }

    #[test]
    fn test_missing_provider_is_signed_out() {
        let auth = ProviderAuth::new(&remote_settings());
        assert_eq!(auth.current_auth_state(), AuthState::signed_out());
    }

    /// Write an executable shell script standing in for a provider binary.
    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("caldir-provider-scripted");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn access_token() -> AccessToken {
        AccessToken {
            remote_config: serde_json::Map::new(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provider_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::from_name("scripted").with_binary(script(
            &dir,
            r#"read request; echo '{"status":"success","data":"tok-123"}'"#,
        ));

        let token = provider.call(access_token()).await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-123"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provider_that_hangs_up_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::from_name("scripted").with_binary(script(&dir, "exit 0"));

        let err = provider.call(access_token()).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::from_name("scripted").with_binary(script(&dir, "sleep 30"));

        let err = provider.call(access_token()).await.unwrap_err();
        match err {
            SyncError::Transport(message) => assert!(message.contains("timed out"), "{message}"),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_auth_state_is_resolved_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "exit 0");
        let auth = ProviderAuth::with_provider(
            Provider::from_name("scripted").with_binary(&path),
            &remote_settings(),
        );

        std::fs::remove_file(&path).unwrap();
        assert!(auth.current_auth_state().signed_in);
    }

    #[tokio::test]
    async fn test_missing_provider_surfaces_as_not_installed() {
        let provider = Provider::from_name("definitely-not-installed");
        let err = provider
            .call(AccessToken {
                remote_config: serde_json::Map::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProviderNotInstalled(_)));
    }
}
