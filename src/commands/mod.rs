pub mod browse;
pub mod clear;
pub mod events;
pub mod refresh;

use std::sync::Arc;

use anyhow::Result;
use caldir_window_core::config::MirrorConfig;
use caldir_window_core::remote::{Provider, ProviderAuth, ProviderRemote};
use caldir_window_core::settings::StaticSettings;
use caldir_window_core::store::JsonFileStore;
use caldir_window_core::{CalendarMirror, Collaborators, SyncOptions};
use tracing::debug;

/// Build a mirror from the user's config, backed by the JSON cache file.
pub async fn open_mirror() -> Result<CalendarMirror> {
    let config = MirrorConfig::load()?;

    let Some(remote) = config.remote.as_ref() else {
        anyhow::bail!(
            "No remote calendar configured.\n\n\
            Add a [remote] section to {}\n\n\
            Example:\n  \
            [remote]\n  \
            provider = \"google\"\n  \
            google_account = \"me@example.com\"",
            MirrorConfig::config_path()?.display()
        );
    };

    let provider = Provider::from_name(&remote.provider);
    if !provider.is_installed() {
        anyhow::bail!(
            "Provider 'caldir-provider-{}' not found in PATH.\n\n\
            Install it and try again.",
            provider.name()
        );
    }

    let store_path = config.store_path()?;
    debug!(path = %store_path.display(), "opening local cache");
    let store = JsonFileStore::open(store_path).await?;

    let settings = Arc::new(StaticSettings::new(config.time_zone()?));

    Ok(CalendarMirror::new(
        Collaborators {
            auth: Arc::new(ProviderAuth::new(remote)),
            remote: Arc::new(ProviderRemote::new(remote, settings.clone())),
            store: Arc::new(store),
            settings,
        },
        SyncOptions::from(&config),
    ))
}
