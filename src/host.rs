//! The application host plugins register against.
//!
//! An [`App`] owns three things:
//!
//! - a registry of named capabilities ("decorations") that any component
//!   holding the app can read back with a typed lookup,
//! - a list of [`CloseHook`]s run once when the app shuts down,
//! - a record of which plugins were registered.
//!
//! ```rust,ignore
//! let app = App::new();
//! app.register(&NodemailerPlugin::new(), json!({ "host": "smtp.example.com", "pool": true })).await?;
//!
//! let mailer = app.nodemailer().expect("registered above");
//! mailer.send_mail(&email).await?;
//!
//! app.close().await?; // closes the SMTP pool
//! ```

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use semver::{Version, VersionReq};
use serde_json::Value;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PluginError;

/// Host version reported by [`App::new`].
pub const DEFAULT_HOST_VERSION: Version = Version::new(5, 1, 0);

type Decoration = Arc<dyn Any + Send + Sync>;

/// A callback run during [`App::close`].
#[async_trait]
pub trait CloseHook: Send + Sync {
    async fn on_close(&self, app: &App) -> Result<(), PluginError>;
}

/// Static description of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginMeta {
    /// Unique plugin name.
    pub name: &'static str,
    /// Semver requirement on the host version, e.g. `">5.0.0"`.
    pub host_version: &'static str,
}

/// Something that can be registered with an [`App`].
#[async_trait]
pub trait Plugin: Send + Sync {
    fn meta(&self) -> PluginMeta;

    /// Attach whatever the plugin provides to `app`.
    ///
    /// Called at most once per app, after the host checked [`Plugin::meta`].
    async fn register(&self, app: &App, options: Value) -> Result<(), PluginError>;
}

/// Application host.
pub struct App {
    version: Version,
    decorations: RwLock<HashMap<String, Decoration>>,
    hooks: Mutex<Vec<Arc<dyn CloseHook>>>,
    plugins: Mutex<Vec<&'static str>>,
    closed: AtomicBool,
}

impl App {
    pub fn new() -> Self {
        Self::with_version(DEFAULT_HOST_VERSION)
    }

    pub fn with_version(version: Version) -> Self {
        Self {
            version,
            decorations: RwLock::new(HashMap::new()),
            hooks: Mutex::new(Vec::new()),
            plugins: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Capability registry
    // =========================================================================

    /// Attach `value` under `name`.
    ///
    /// Fails with [`PluginError::DecorationConflict`] if the name is taken.
    pub fn decorate<T>(&self, name: impl Into<String>, value: Arc<T>) -> Result<(), PluginError>
    where
        T: Any + Send + Sync,
    {
        match self.decorations.write().entry(name.into()) {
            Entry::Occupied(entry) => Err(PluginError::DecorationConflict {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(name = %entry.key(), "Decorated app");
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorations.read().contains_key(name)
    }

    /// Read back a decoration.
    ///
    /// Returns the same `Arc` that was attached, or `None` if the name is
    /// free or holds a different type.
    pub fn decoration<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.decorations.read().get(name).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Names of all decorations, sorted.
    pub fn decorator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.decorations.read().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register a hook to run when the app closes.
    pub fn add_on_close<H>(&self, hook: H) -> Result<(), PluginError>
    where
        H: CloseHook + 'static,
    {
        if self.is_closed() {
            return Err(PluginError::HostClosed);
        }
        self.hooks.lock().push(Arc::new(hook));
        Ok(())
    }

    /// Number of pending close hooks.
    pub fn close_hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Register a plugin.
    ///
    /// Checks the plugin's host version requirement and that no plugin with
    /// the same name is already registered, then hands it `options`.
    pub async fn register<P>(&self, plugin: &P, options: Value) -> Result<(), PluginError>
    where
        P: Plugin + ?Sized,
    {
        if self.is_closed() {
            return Err(PluginError::HostClosed);
        }

        let meta = plugin.meta();
        let required = VersionReq::parse(meta.host_version)?;
        if !required.matches(&self.version) {
            return Err(PluginError::IncompatibleHost {
                plugin: meta.name,
                required: required.to_string(),
                found: self.version.to_string(),
            });
        }
        // Reserved before awaiting; released again if registration fails
        {
            let mut plugins = self.plugins.lock();
            if plugins.contains(&meta.name) {
                return Err(PluginError::DuplicatePlugin { name: meta.name });
            }
            plugins.push(meta.name);
        }

        tracing::debug!(plugin = meta.name, "Registering plugin");
        match plugin.register(self, options).await {
            Ok(()) => {
                tracing::info!(plugin = meta.name, "Plugin registered");
                Ok(())
            }
            Err(e) => {
                self.plugins.lock().retain(|p| *p != meta.name);
                tracing::error!(plugin = meta.name, error = %e, "Plugin registration failed");
                Err(e)
            }
        }
    }

    /// Callback form of [`App::register`]. `done` is called exactly once,
    /// with `None` on success.
    pub async fn register_with<P, F>(&self, plugin: &P, options: Value, done: F)
    where
        P: Plugin + ?Sized,
        F: FnOnce(Option<PluginError>),
    {
        done(self.register(plugin, options).await.err())
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.lock().iter().any(|p| *p == name)
    }

    /// Shut the app down, running every close hook once.
    ///
    /// Hooks run in reverse registration order. A failing hook is logged and
    /// does not stop the others; the first failure is returned. Closing an
    /// already closed app is a no-op.
    pub async fn close(&self) -> Result<(), PluginError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let hooks = std::mem::take(&mut *self.hooks.lock());
        tracing::info!(hooks = hooks.len(), "Closing app");

        let mut first_error = None;
        for hook in hooks.iter().rev() {
            if let Err(e) = hook.on_close(self).await {
                tracing::error!(error = %e, "Close hook failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("version", &self.version.to_string())
            .field("decorations", &self.decorator_names())
            .field("close_hooks", &self.close_hook_count())
            .field("plugins", &*self.plugins.lock())
            .field("closed", &self.is_closed())
            .finish()
    }
}
