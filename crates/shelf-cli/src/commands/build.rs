//! Build commands: manual trigger, pre-packaging hook, status, dry-run plan

use anyhow::{Context, Result};
use shelf_address::{
    AddressAssigner, BuildFailure, BuildOrchestrator, BuildOutcome, ConfigStore, FailurePolicy,
    FsBackend, ShelfSettings, TomlConfigStore, TomlPreferenceStore,
};
use std::path::Path;
use tracing::debug;

type Orchestrator = BuildOrchestrator<FsBackend, TomlConfigStore, TomlPreferenceStore>;

fn open(settings: &ShelfSettings) -> Result<Orchestrator> {
    debug!("Using settings {:?}", settings);
    let backend = FsBackend::from_settings(settings).context("Failed to open project")?;
    let prefs = TomlPreferenceStore::open(&settings.prefs_path)
        .context("Failed to open preference store")?;
    Ok(BuildOrchestrator::new(
        backend,
        TomlConfigStore::new(&settings.config_path),
        prefs,
    )
    .with_failure_policy(settings.failure_policy))
}

fn print_outcome(outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::UpToDate { fingerprint } => {
            println!("Up to date ({})", fingerprint);
        }
        BuildOutcome::Built {
            fingerprint,
            assigned,
            groups_created,
            built_at,
        } => {
            println!("Built {} resource(s)", assigned);
            if !groups_created.is_empty() {
                println!("  New groups: {}", groups_created.join(", "));
            }
            println!("  Fingerprint: {}", fingerprint);
            println!("  Built at: {}", built_at);
        }
        BuildOutcome::Failed(failure) => {
            eprintln!("Build failed: {}", failure);
            if let BuildFailure::Assignment(report) = failure {
                eprintln!(
                    "  {} applied, {} not attempted",
                    report.applied.len(),
                    report.skipped.len()
                );
            }
        }
    }
}

pub fn run_build(root: &Path) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let outcome = open(&settings)?.run_manual();
    print_outcome(&outcome);

    if let Some(failure) = outcome.failure() {
        anyhow::bail!("{}", failure);
    }
    Ok(())
}

pub fn run_hook(root: &Path, strict: bool) -> Result<()> {
    let mut settings = ShelfSettings::load(root)?;
    if strict {
        settings.failure_policy = FailurePolicy::Propagate;
    }

    let outcome = open(&settings)?.pre_packaging_hook()?;
    print_outcome(&outcome);
    Ok(())
}

pub fn run_status(root: &Path) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let status = open(&settings)?.status()?;

    println!("Config: {}", status.config_location);
    if !status.config_present {
        println!("  (missing; run `shelf init` to create one)");
    }
    println!(
        "  Current fingerprint: {}",
        status
            .current_fingerprint
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Last fingerprint: {}",
        status.last_fingerprint.as_deref().unwrap_or("-")
    );
    println!(
        "  Last build time: {}",
        status.last_build_time.as_deref().unwrap_or("never")
    );
    println!("  Failure policy: {:?}", settings.failure_policy);
    println!(
        "  Needs rebuild: {}",
        if status.needs_rebuild { "yes" } else { "no" }
    );
    Ok(())
}

pub fn run_plan(root: &Path, format: &str) -> Result<()> {
    let settings = ShelfSettings::load(root)?;
    let store = TomlConfigStore::new(&settings.config_path);
    let Some(config) = store.load()? else {
        anyhow::bail!("No config at {}; run `shelf init` first", store.location());
    };
    config.validate()?;

    let mut backend = FsBackend::from_settings(&settings)?;
    let plan = AddressAssigner::new(&mut backend).plan(&config)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        "text" => {
            if plan.is_empty() {
                println!("No resources found under the configured folders.");
                return Ok(());
            }
            println!("{} resource(s):\n", plan.len());
            for record in &plan.records {
                let label = record
                    .label
                    .as_deref()
                    .map(|l| format!("  [{}]", l))
                    .unwrap_or_default();
                println!(
                    "  {:<40} -> {} ({}){}",
                    record.resource, record.address, record.group, label
                );
            }
            let groups = plan.groups();
            if !groups.is_empty() {
                println!("\nGroups: {}", groups.join(", "));
            }
        }
        other => anyhow::bail!("Unknown format '{}'; use text or json", other),
    }
    Ok(())
}
