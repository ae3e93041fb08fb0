//! Runtime fetch commands against the last packaged build

use anyhow::{Context, Result};
use shelf_address::ShelfSettings;
use shelf_load::{Loader, PackagedAsset, PackagedFetcher};
use std::fs;
use std::path::Path;

fn print_asset(asset: &PackagedAsset) {
    println!("{}", asset.address);
    println!("  Resource: {}", asset.resource);
    println!("  Size: {} bytes", asset.len());
    if !asset.labels.is_empty() {
        println!("  Labels: {}", asset.labels.join(", "));
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}

pub fn run_get(root: &Path, address: &str, output: Option<&Path>) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let runtime = runtime()?;

    let asset = runtime.block_on(async {
        let loader = Loader::new(PackagedFetcher::open(&settings.build_dir)?);
        let asset = loader.try_load_one(address).await?.loaded();
        anyhow::Ok(asset)
    })?;
    let Some(asset) = asset else {
        anyhow::bail!("Load of '{}' was cancelled", address);
    };

    print_asset(&asset);
    if let Some(output) = output {
        fs::write(output, asset.bytes.as_slice())
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("  Written to: {}", output.display());
    }
    Ok(())
}

pub fn run_label(root: &Path, label: &str, first: bool) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let runtime = runtime()?;

    let assets = runtime.block_on(async {
        let loader = Loader::new(PackagedFetcher::open(&settings.build_dir)?);
        let assets: Vec<PackagedAsset> = if first {
            loader.try_load_first(label).await?.loaded().into_iter().collect()
        } else {
            loader.try_load_many(label).await?.loaded().unwrap_or_default()
        };
        anyhow::Ok(assets)
    })?;

    println!("{} asset(s) for '{}':\n", assets.len(), label);
    for asset in &assets {
        print_asset(asset);
    }
    Ok(())
}
