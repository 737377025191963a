// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted [`SessionSettings`] per named profile.

use tracing::{debug, warn};
use weft_core::SessionSettings;

use crate::config::{ConfigError, ConfigService, ConfigStore};

/// Loads and saves session settings through a [`ConfigStore`].
pub struct SettingsService<S> {
    config: ConfigService<S>,
}

impl<S: ConfigStore> SettingsService<S> {
    /// Wraps `store`.
    pub fn new(store: S) -> Self {
        Self {
            config: ConfigService::new(store),
        }
    }

    /// Store key used for `profile`.
    pub fn key_for(profile: &str) -> String {
        format!("session-{profile}")
    }

    /// Loads the settings saved for `profile`.
    ///
    /// A missing profile yields the defaults silently; an unreadable one
    /// (bad key, store failure, malformed JSON) is logged and also yields the
    /// defaults, so a host can always start a session.
    pub fn load_or_default(&self, profile: &str) -> SessionSettings {
        match self.config.load::<SessionSettings>(&Self::key_for(profile)) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(%profile, "no saved settings; using defaults");
                SessionSettings::default()
            }
            Err(err) => {
                warn!(%profile, error = %err, "saved settings unreadable; using defaults");
                SessionSettings::default()
            }
        }
    }

    /// Saves `settings` under `profile`.
    pub fn save(&self, profile: &str, settings: &SessionSettings) -> Result<(), ConfigError> {
        self.config.save(&Self::key_for(profile), settings)
    }

    /// Consume the service and return the store.
    pub fn into_inner(self) -> S {
        self.config.into_inner()
    }
}
