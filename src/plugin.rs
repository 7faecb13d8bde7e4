//! The transport registration plugin.
//!
//! Registering [`NodemailerPlugin`] with an [`App`]:
//!
//! 1. resolves the options and builds a transport through the plugin's
//!    [`TransportFactory`],
//! 2. attaches a [`Transporter`] to the app under [`NODEMAILER`],
//! 3. in pooled mode, adds a close hook that closes the transporter when the
//!    app shuts down.
//!
//! A construction failure leaves the app untouched: nothing is attached and
//! no hook is added.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::PluginError;
use crate::host::{App, CloseHook, Plugin, PluginMeta};
use crate::options::{is_pooled_map, TransportOptions};
use crate::transport::{TransportFactory, Transporter};

/// Name the transporter is attached under.
pub const NODEMAILER: &str = "nodemailer";

/// Name the plugin registers as.
pub const PLUGIN_NAME: &str = "@asjas/fastify-nodemailer";

/// Host versions the plugin supports.
pub const HOST_VERSION_REQ: &str = ">5.0.0";

/// Attaches a mail transport to an [`App`].
#[derive(Clone)]
pub struct NodemailerPlugin {
    factory: Arc<dyn TransportFactory>,
}

impl NodemailerPlugin {
    /// Plugin building SMTP transports with lettre.
    #[cfg(feature = "smtp")]
    pub fn new() -> Self {
        Self::with_factory(crate::providers::SmtpFactory)
    }

    /// Plugin building transports with a custom factory.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: TransportFactory + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }
}

#[cfg(feature = "smtp")]
impl Default for NodemailerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodemailerPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodemailerPlugin").finish_non_exhaustive()
    }
}

#[async_trait]
impl Plugin for NodemailerPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: PLUGIN_NAME,
            host_version: HOST_VERSION_REQ,
        }
    }

    async fn register(&self, app: &App, options: Value) -> Result<(), PluginError> {
        let options = TransportOptions::from_value(options).map_err(PluginError::Construction)?;
        let transport = self
            .factory
            .create(&options)
            .map_err(PluginError::Construction)?;

        let transporter = Arc::new(Transporter::new(transport, &options));
        app.decorate(NODEMAILER, transporter)?;

        if options.is_pooled() {
            app.add_on_close(CloseTransporter)?;
            tracing::debug!("Registered close hook for pooled transport");
        }

        tracing::info!(
            host = %options.smtp().host,
            pooled = options.is_pooled(),
            "Transporter attached"
        );
        Ok(())
    }
}

/// Whether raw options select pooled mode: an object whose `pool` key is
/// the boolean `true`.
pub fn is_pooled_options(options: &Value) -> bool {
    match options {
        Value::Object(map) => is_pooled_map(map),
        _ => false,
    }
}

/// Close the transporter attached to `app`.
///
/// Close failures are returned as [`PluginError::Close`]; [`App::close`]
/// logs them and carries on with its other hooks.
pub async fn handle_close(app: &App) -> Result<(), PluginError> {
    match app.nodemailer() {
        Some(transporter) => transporter.close().await.map_err(PluginError::Close),
        None => {
            tracing::warn!(name = NODEMAILER, "No transporter attached at shutdown");
            Ok(())
        }
    }
}

struct CloseTransporter;

#[async_trait]
impl CloseHook for CloseTransporter {
    async fn on_close(&self, app: &App) -> Result<(), PluginError> {
        handle_close(app).await
    }
}

/// Typed access to the attached transporter.
pub trait NodemailerExt {
    fn nodemailer(&self) -> Option<Arc<Transporter>>;
}

impl NodemailerExt for App {
    fn nodemailer(&self) -> Option<Arc<Transporter>> {
        self.decoration::<Transporter>(NODEMAILER)
    }
}
