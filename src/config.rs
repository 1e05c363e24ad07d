// src/config.rs

//! Configuration loading and live reload.
//!
//! [`ConfigProvider`] owns the current configuration snapshot and publishes
//! replacements over a `tokio::sync::watch` channel. Poll cycles read the
//! snapshot once at cycle start.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::Config;

/// Load a configuration file, apply environment overrides and validate.
///
/// A missing file falls back to defaults; a malformed or invalid one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!(
            "Config file {} not found. Using defaults.",
            path.display()
        );
        Config::default()
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Source of the current configuration snapshot.
pub struct ConfigProvider {
    path: Option<PathBuf>,
    sender: watch::Sender<Arc<Config>>,
    modified: Mutex<Option<SystemTime>>,
}

impl ConfigProvider {
    /// Load `path` and track it for reloads.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = load_config(&path)?;
        let (sender, _) = watch::channel(Arc::new(config));

        Ok(Self {
            modified: Mutex::new(modified_at(&path)),
            path: Some(path),
            sender,
        })
    }

    /// Provider over a fixed configuration; `reload` is a no-op.
    pub fn fixed(config: Config) -> Self {
        let (sender, _) = watch::channel(Arc::new(config));
        Self {
            path: None,
            sender,
            modified: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Arc<Config> {
        self.sender.borrow().clone()
    }

    /// Receiver notified whenever a new configuration is published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.sender.subscribe()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the file and publish it if it differs from the current snapshot.
    ///
    /// Returns whether a new snapshot was published. An invalid file leaves
    /// the current snapshot in place.
    pub fn reload(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        if let Ok(mut modified) = self.modified.lock() {
            *modified = modified_at(path);
        }

        let config = load_config(path)?;
        if *self.current() == config {
            return Ok(false);
        }

        if self.current().storage.database != config.storage.database {
            log::warn!("storage.database changed; the new path takes effect after a restart");
        }
        self.sender.send_replace(Arc::new(config));
        Ok(true)
    }

    /// Reload only if the file's modification time moved.
    pub fn reload_if_modified(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let seen = self.modified.lock().ok().and_then(|m| *m);
        if modified_at(path) == seen {
            return Ok(false);
        }
        self.reload()
    }

    /// Poll the config file every `every` and republish changes.
    pub fn spawn_watcher(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.reload_if_modified() {
                    Ok(true) => log::info!("Configuration reloaded"),
                    Ok(false) => {}
                    Err(e) => log::warn!("Ignoring invalid configuration change: {}", e),
                }
            }
        })
    }
}
