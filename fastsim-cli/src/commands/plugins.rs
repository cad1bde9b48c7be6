//! List registered plugin keys.

use anyhow::Result;
use fastsim_runtime::PluginRegistry;

pub fn list_plugins() -> Result<()> {
    let registry = PluginRegistry::with_builtins();
    for key in registry.keys() {
        println!("{}", key);
    }
    Ok(())
}
