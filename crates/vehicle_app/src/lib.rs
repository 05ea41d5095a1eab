//! Smart wipers vehicle application.
//!
//! On start the hood is closed, a listener is attached to `Hood.IsOpen`, the
//! front wipers are switched to `MEDIUM` and finally the hood is opened. The
//! listener turns the wipers off and notifies the driver's phone whenever the
//! hood reports open, so the startup's own final write switches the wipers
//! straight back off. Both paths write the wiper mode without any ordering
//! between them.

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use databroker::{spawn_handler, DataPointAccessor, SubscriptionHandle, Vehicle};
use plugins::{Plugin, PluginRegistry, SMART_WIPERS_PLUGIN};
use shared::{
    domain::{FrontWipingMode, HoodIsOpen, WiperMode},
    protocol::DataPointReply,
};
use tokio::sync::Mutex;
use tracing::{error, info};

pub const HOOD_OPENED_MESSAGE: &str = "Info: Wipers were turned off because hood was opened";

const DEFAULT_WIPERS_ON_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_HOOD_OPEN_DELAY: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupTiming {
    /// Pause between registering the hood listener and turning the wipers on.
    pub wipers_on_delay: Duration,
    /// Pause between turning the wipers on and opening the hood.
    pub hood_open_delay: Duration,
}

impl Default for StartupTiming {
    fn default() -> Self {
        Self {
            wipers_on_delay: DEFAULT_WIPERS_ON_DELAY,
            hood_open_delay: DEFAULT_HOOD_OPEN_DELAY,
        }
    }
}

/// Reaction to a `Hood.IsOpen` notification. Owns everything it touches so
/// each invocation can run as an independent task.
#[derive(Clone)]
pub struct HoodOpenedHandler {
    wiper_mode: DataPointAccessor<FrontWipingMode>,
    plugin: Arc<dyn Plugin>,
}

impl HoodOpenedHandler {
    pub fn new(wiper_mode: DataPointAccessor<FrontWipingMode>, plugin: Arc<dyn Plugin>) -> Self {
        Self { wiper_mode, plugin }
    }

    pub async fn on_hood_is_open_changed(&self, reply: DataPointReply) -> Result<()> {
        let is_open = reply
            .get::<HoodIsOpen>()
            .context("hood notification did not carry the hood state")?;
        info!(is_open, "Listener was triggered");
        if !is_open {
            return Ok(());
        }

        self.wiper_mode
            .set(WiperMode::Off)
            .await
            .context("failed to turn off wipers")?;
        info!("Wipers were turned off because hood was opened");
        self.plugin.notify(HOOD_OPENED_MESSAGE);
        Ok(())
    }
}

pub struct SmartWipersApp {
    vehicle: Vehicle,
    plugins: PluginRegistry,
    plugin_name: String,
    timing: StartupTiming,
    hood_listener: Mutex<Option<SubscriptionHandle>>,
}

impl SmartWipersApp {
    pub fn new(vehicle: Vehicle, plugins: PluginRegistry) -> Arc<Self> {
        Self::with_options(
            vehicle,
            plugins,
            SMART_WIPERS_PLUGIN,
            StartupTiming::default(),
        )
    }

    pub fn with_options(
        vehicle: Vehicle,
        plugins: PluginRegistry,
        plugin_name: impl Into<String>,
        timing: StartupTiming,
    ) -> Arc<Self> {
        Arc::new(Self {
            vehicle,
            plugins,
            plugin_name: plugin_name.into(),
            timing,
            hood_listener: Mutex::new(None),
        })
    }

    /// Runs the startup scenario once. Any failure ends the sequence at the
    /// failing step; a listener registered before that point stays live.
    pub async fn on_start(&self) -> Result<()> {
        let plugin = self
            .plugins
            .get_plugin(&self.plugin_name)
            .with_context(|| format!("failed to look up plugin '{}'", self.plugin_name))?;
        plugin.notify("");

        let hood = &self.vehicle.body.hood.is_open;
        let wiper_mode = &self.vehicle.body.windshield.front.wiping.mode;

        hood.set(false).await.context("failed to close the hood")?;

        let subscription = hood
            .subscribe()
            .await
            .context("failed to subscribe to hood state")?;
        let handler = HoodOpenedHandler::new(wiper_mode.clone(), plugin);
        let listener = spawn_handler(subscription, move |reply| {
            let handler = handler.clone();
            async move { handler.on_hood_is_open_changed(reply).await }
        });
        let previous = self.hood_listener.lock().await.replace(listener);
        if let Some(previous) = previous {
            previous.unsubscribe().await;
        }
        info!("Listener was registered");

        tokio::time::sleep(self.timing.wipers_on_delay).await;
        info!("Turn on Wipers");
        wiper_mode
            .set(WiperMode::Medium)
            .await
            .context("failed to turn on wipers")?;

        tokio::time::sleep(self.timing.hood_open_delay).await;
        info!("Open the hood");
        hood.set(true).await.context("failed to open the hood")?;

        Ok(())
    }

    /// Runs the startup scenario in its own task and keeps serving hood
    /// notifications until `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let app = Arc::clone(&self);
        let startup = tokio::spawn(async move {
            if let Err(err) = app.on_start().await {
                error!(error = %format!("{err:#}"), "startup sequence failed");
            }
        });

        shutdown.await;
        info!("shutdown requested");

        startup.abort();
        let startup_result = startup.await;
        self.stop().await;

        match startup_result {
            Err(err) if err.is_panic() => Err(anyhow!("startup task panicked: {err}")),
            _ => Ok(()),
        }
    }

    pub async fn stop(&self) {
        let listener = self.hood_listener.lock().await.take();
        if let Some(listener) = listener {
            listener.unsubscribe().await;
        }
    }

    pub async fn is_listening(&self) -> bool {
        self.hood_listener
            .lock()
            .await
            .as_ref()
            .is_some_and(SubscriptionHandle::is_active)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
