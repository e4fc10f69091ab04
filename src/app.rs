//! Bridge Host
//!
//! Owns the registered plugins and routes web-layer calls to them. Plugins
//! are registered explicitly on a `BridgeBuilder`; `build` loads them all,
//! and `shutdown` (or drop) destroys each exactly once.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::plugin::{Plugin, PluginCall};
use crate::shared::{BridgeCall, BridgeResponse};

/// Collects plugins before the bridge is constructed
#[derive(Default)]
pub struct BridgeBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A later registration under the same name replaces
    /// an earlier one.
    pub fn register_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        debug!("Registering plugin {}", plugin.name());
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Load every registered plugin and start the bridge.
    ///
    /// If any plugin fails to load, the ones already loaded are destroyed
    /// and the error is returned.
    pub fn build(self) -> Result<Bridge> {
        // Load order follows registration order
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::with_capacity(self.plugins.len());
        for plugin in self.plugins {
            let before = plugins.len();
            plugins.retain(|p| p.name() != plugin.name());
            if plugins.len() != before {
                warn!(
                    "Plugin {} registered twice; keeping the later registration",
                    plugin.name()
                );
            }
            plugins.push(plugin);
        }

        for (index, plugin) in plugins.iter().enumerate() {
            if let Err(e) = plugin.load() {
                for loaded in plugins[..index].iter().rev() {
                    debug!("Rolling back plugin {}", loaded.name());
                    loaded.handle_on_destroy();
                }
                return Err(e).with_context(|| format!("Failed to load plugin {}", plugin.name()));
            }
        }

        info!("Bridge started with {} plugin(s)", plugins.len());

        Ok(Bridge {
            plugins: RwLock::new(plugins),
        })
    }
}

/// Routes calls to loaded plugins. Safe to share across threads.
pub struct Bridge {
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

impl Bridge {
    /// Names of the plugins currently loaded
    pub fn plugin_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.plugins.read().iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names
    }

    /// Deliver one call and return its response
    pub fn dispatch(&self, call: BridgeCall) -> BridgeResponse {
        let plugin_id = call.plugin_id.clone();
        let call = PluginCall::from_bridge_call(call);

        // Clone out so the map lock is not held while the plugin works
        let plugin = self
            .plugins
            .read()
            .iter()
            .find(|p| p.name() == plugin_id)
            .cloned();
        let Some(plugin) = plugin else {
            warn!("Call {} to unknown plugin {}", call.call_id(), plugin_id);
            return BridgeResponse::rejected(
                call.call_id(),
                format!("\"{plugin_id}\" plugin is not implemented"),
                Some("UNIMPLEMENTED".to_string()),
            );
        };

        if !plugin.methods().contains(&call.method()) {
            warn!("Call {} to unknown method {}.{}", call.call_id(), plugin_id, call.method());
            return BridgeResponse::rejected(
                call.call_id(),
                format!("No method {} found for plugin {}", call.method(), plugin_id),
                Some("UNIMPLEMENTED".to_string()),
            );
        }

        debug!("Dispatching call {} to {}.{}", call.call_id(), plugin_id, call.method());
        plugin
            .invoke(call.method(), &call)
            .into_bridge_response(call.call_id())
    }

    /// Destroy every plugin, last registered first. Later calls are rejected
    /// as unknown plugins.
    pub fn shutdown(&self) {
        let plugins = std::mem::take(&mut *self.plugins.write());
        if plugins.is_empty() {
            return;
        }

        for plugin in plugins.into_iter().rev() {
            debug!("Destroying plugin {}", plugin.name());
            plugin.handle_on_destroy();
        }
        info!("Bridge shut down");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
