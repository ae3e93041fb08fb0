//! Config scaffolding

use anyhow::Result;
use shelf_address::{AddressConfig, ConfigStore, ShelfSettings, TomlConfigStore};
use std::path::Path;

pub fn run(root: &Path, force: bool) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let mut store = TomlConfigStore::new(&settings.config_path);

    if !force && store.load()?.is_some() {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            store.location()
        );
    }

    let config = AddressConfig::scaffold();
    store.save(&config)?;

    println!("Created config at {}", store.location());
    for folder in &config.folders {
        println!("  Folder: {}", folder);
    }
    println!("Add [[rules]] tables to group resources, then run `shelf build`.");
    Ok(())
}
