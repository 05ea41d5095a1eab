use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::error::PluginError;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub const SMART_WIPERS_PLUGIN: &str = "SmartWipersBasic";
pub const TERMINAL_PLUGIN: &str = "Terminal";

const NOTIFICATION_BUFFER: usize = 64;

/// Capability exposed to vehicle applications by name.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Fire-and-forget delivery; never blocks and never reports failure.
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNotification {
    pub plugin: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Pushes notifications to the driver's paired phone.
pub struct PhoneNotifierPlugin {
    name: String,
    events: broadcast::Sender<PhoneNotification>,
}

impl PhoneNotifierPlugin {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Arc::new(Self {
            name: name.into(),
            events,
        })
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<PhoneNotification> {
        self.events.subscribe()
    }
}

impl Plugin for PhoneNotifierPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, message: &str) {
        let notification = PhoneNotification {
            plugin: self.name.clone(),
            message: message.to_string(),
            sent_at: Utc::now(),
        };
        match serde_json::to_string(&notification) {
            Ok(payload) => info!(plugin = %self.name, %payload, "phone notification sent"),
            Err(err) => {
                warn!(plugin = %self.name, error = %err, "failed to encode phone notification")
            }
        }
        // No observers is fine.
        let _ = self.events.send(notification);
    }
}

/// Writes notifications to the process stdout.
pub struct TerminalPlugin;

impl Plugin for TerminalPlugin {
    fn name(&self) -> &str {
        TERMINAL_PLUGIN
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `plugin` under its own name, returning any plugin it replaced.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        self.plugins.insert(plugin.name().to_string(), plugin)
    }

    pub fn get_plugin(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(PhoneNotifierPlugin::new(SMART_WIPERS_PLUGIN));
    registry.register(Arc::new(TerminalPlugin));
    registry
}
