//! Change-gated build orchestration
//!
//! The same sequence backs both entry points: the automatic pre-packaging hook,
//! which is skipped when the config fingerprint is unchanged, and the manual
//! trigger, which always runs.

use crate::assigner::{AddressAssigner, AssignmentFailure, AssignmentReport};
use crate::backend::AssetBackend;
use crate::config::{AddressConfig, ConfigStore};
use crate::fingerprint::{should_rebuild, Fingerprint};
use crate::prefs::{PreferenceStore, LAST_BUILD_TIME_KEY, LAST_FINGERPRINT_KEY};
use crate::settings::FailurePolicy;
use shelf_core::{Result, ShelfError};
use std::fmt;
use tracing::{error, info, warn};

/// Why a build pass did not complete
#[derive(Debug, Clone)]
pub enum BuildFailure {
    /// No configuration document exists
    ConfigMissing(String),
    /// The document could not be loaded or failed validation
    Config(String),
    /// Zero resource folders configured; nothing was touched
    EmptyFolderList,
    /// Enumeration or plan validation failed before any assignment
    Plan(String),
    /// The assignment pass stopped early; packaging was not attempted
    Assignment(AssignmentReport),
    /// Packaging failed; the stored fingerprint was left alone
    Packaging(String),
    /// Reading or writing the preference store failed
    Preference(String),
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildFailure::ConfigMissing(location) => {
                write!(f, "no configuration found at {}", location)
            }
            BuildFailure::Config(reason) => write!(f, "configuration error: {}", reason),
            BuildFailure::EmptyFolderList => write!(f, "no resource folders configured"),
            BuildFailure::Plan(reason) => write!(f, "could not plan assignments: {}", reason),
            BuildFailure::Assignment(report) => match &report.failure {
                Some(AssignmentFailure::Record { record, reason }) => write!(
                    f,
                    "address assignment failed at {} ({}); {} applied, {} not attempted",
                    record.resource,
                    reason,
                    report.applied.len(),
                    report.skipped.len()
                ),
                Some(AssignmentFailure::Persist { reason }) => {
                    write!(f, "persisting assignments failed: {}", reason)
                }
                None => write!(f, "address assignment failed"),
            },
            BuildFailure::Packaging(reason) => write!(f, "packaging failed: {}", reason),
            BuildFailure::Preference(reason) => write!(f, "preference store error: {}", reason),
        }
    }
}

impl From<BuildFailure> for ShelfError {
    fn from(failure: BuildFailure) -> Self {
        match failure {
            BuildFailure::ConfigMissing(location) => ShelfError::ConfigMissing(location),
            BuildFailure::Config(reason) => ShelfError::InvalidConfig(reason),
            BuildFailure::EmptyFolderList => ShelfError::EmptyFolderList,
            BuildFailure::Plan(reason) => ShelfError::Validation(reason),
            BuildFailure::Assignment(report) => match report.into_result() {
                Err(e) => e,
                Ok(_) => ShelfError::Build("address assignment failed".to_string()),
            },
            BuildFailure::Packaging(reason) => ShelfError::Build(reason),
            BuildFailure::Preference(reason) => ShelfError::Preference(reason),
        }
    }
}

/// Result of one orchestrated pass
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The fingerprint matched; nothing ran
    UpToDate { fingerprint: Fingerprint },
    /// Assignment and packaging ran and the new fingerprint was stored
    Built {
        fingerprint: Fingerprint,
        assigned: usize,
        groups_created: Vec<String>,
        built_at: String,
    },
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, BuildOutcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&BuildFailure> {
        match self {
            BuildOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Snapshot for status displays
#[derive(Debug, Clone)]
pub struct BuildStatus {
    pub config_location: String,
    pub config_present: bool,
    pub last_fingerprint: Option<String>,
    pub last_build_time: Option<String>,
    pub current_fingerprint: Option<Fingerprint>,
    pub needs_rebuild: bool,
}

/// Runs assignment and packaging against a backend, gated on the config fingerprint
pub struct BuildOrchestrator<B, C, P> {
    backend: B,
    configs: C,
    prefs: P,
    failure_policy: FailurePolicy,
}

impl<B, C, P> BuildOrchestrator<B, C, P>
where
    B: AssetBackend,
    C: ConfigStore,
    P: PreferenceStore,
{
    pub fn new(backend: B, configs: C, prefs: P) -> Self {
        Self {
            backend,
            configs,
            prefs,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn configs_mut(&mut self) -> &mut C {
        &mut self.configs
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    /// Entry point for the host pipeline, called before content is packaged.
    ///
    /// Under [`FailurePolicy::Swallow`] a failed pass is logged and returned as
    /// `Ok(BuildOutcome::Failed(..))`; under [`FailurePolicy::Propagate`] it is
    /// returned as an error so the host can stop.
    pub fn pre_packaging_hook(&mut self) -> Result<BuildOutcome> {
        info!("Running address assignment and packaging");
        let outcome = self.run_gated();

        if let BuildOutcome::Failed(failure) = &outcome {
            error!("Build step failed: {}", failure);
            if self.failure_policy == FailurePolicy::Propagate {
                return Err(failure.clone().into());
            }
        }
        Ok(outcome)
    }

    /// Manual trigger: assign, package and record the fingerprint regardless of changes
    pub fn run_manual(&mut self) -> BuildOutcome {
        info!("Running manual address assignment and packaging");
        let outcome = match self.load_config() {
            Ok(config) => self.execute(&config),
            Err(failure) => BuildOutcome::Failed(failure),
        };

        match &outcome {
            BuildOutcome::Failed(failure) => error!("Manual build failed: {}", failure),
            _ => info!("Manual build completed successfully"),
        }
        outcome
    }

    pub fn status(&self) -> Result<BuildStatus> {
        let config = self.configs.load()?;
        let last_fingerprint = self.prefs.get(LAST_FINGERPRINT_KEY)?;
        let last_build_time = self.prefs.get(LAST_BUILD_TIME_KEY)?;

        let needs_rebuild = match &config {
            Some(config) => should_rebuild(config, last_fingerprint.as_deref()),
            None => true,
        };

        Ok(BuildStatus {
            config_location: self.configs.location(),
            config_present: config.is_some(),
            current_fingerprint: config.as_ref().map(Fingerprint::of),
            last_fingerprint,
            last_build_time,
            needs_rebuild,
        })
    }

    fn run_gated(&mut self) -> BuildOutcome {
        let config = match self.load_config() {
            Ok(config) => config,
            Err(failure) => return BuildOutcome::Failed(failure),
        };

        let last = match self.prefs.get(LAST_FINGERPRINT_KEY) {
            Ok(last) => last,
            Err(e) => return BuildOutcome::Failed(BuildFailure::Preference(e.to_string())),
        };

        if !should_rebuild(&config, last.as_deref()) {
            info!("No changes detected in config, skipping packaging");
            return BuildOutcome::UpToDate {
                fingerprint: Fingerprint::of(&config),
            };
        }

        self.execute(&config)
    }

    fn load_config(&self) -> std::result::Result<AddressConfig, BuildFailure> {
        match self.configs.load() {
            Ok(Some(config)) => Ok(config),
            Ok(None) => {
                warn!("No configuration found at {}", self.configs.location());
                Err(BuildFailure::ConfigMissing(self.configs.location()))
            }
            Err(e) => Err(BuildFailure::Config(e.to_string())),
        }
    }

    fn execute(&mut self, config: &AddressConfig) -> BuildOutcome {
        if let Err(e) = config.validate() {
            return BuildOutcome::Failed(BuildFailure::Config(e.to_string()));
        }
        let fingerprint = Fingerprint::of(config);

        let report = match AddressAssigner::new(&mut self.backend).assign_all(config) {
            Ok(report) => report,
            Err(ShelfError::EmptyFolderList) => {
                return BuildOutcome::Failed(BuildFailure::EmptyFolderList)
            }
            Err(e) => return BuildOutcome::Failed(BuildFailure::Plan(e.to_string())),
        };
        if !report.is_success() {
            return BuildOutcome::Failed(BuildFailure::Assignment(report));
        }

        if let Err(e) = self.backend.package() {
            return BuildOutcome::Failed(BuildFailure::Packaging(e.to_string()));
        }
        info!("Packaging completed successfully");

        let built_at = chrono::Utc::now().to_rfc3339();
        let stored = self
            .prefs
            .set(LAST_FINGERPRINT_KEY, fingerprint.as_str())
            .and_then(|()| self.prefs.set(LAST_BUILD_TIME_KEY, &built_at));
        if let Err(e) = stored {
            return BuildOutcome::Failed(BuildFailure::Preference(e.to_string()));
        }

        BuildOutcome::Built {
            fingerprint,
            assigned: report.applied.len(),
            groups_created: report.groups_created,
            built_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupingRule, MemoryConfigStore};
    use crate::mock::{BackendCall, MockBackend};
    use crate::prefs::MemoryPreferenceStore;
    use tracing_test::traced_test;

    type TestOrchestrator = BuildOrchestrator<MockBackend, MemoryConfigStore, MemoryPreferenceStore>;

    fn art_config() -> AddressConfig {
        AddressConfig::new(
            vec!["Assets/Art".to_string()],
            vec![GroupingRule::by_type("Assets/Art", "")],
        )
    }

    fn orchestrator(backend: MockBackend, config: Option<AddressConfig>) -> TestOrchestrator {
        BuildOrchestrator::new(
            backend,
            MemoryConfigStore::new(config),
            MemoryPreferenceStore::new(),
        )
    }

    fn art_backend() -> MockBackend {
        MockBackend::new().with_resources("Assets/Art", &["Assets/Art/icons/sword.png"])
    }

    fn packages(o: &TestOrchestrator) -> usize {
        o.backend().count(|c| matches!(c, BackendCall::Package))
    }

    #[test]
    fn test_first_run_builds_and_stores_fingerprint() {
        let mut o = orchestrator(art_backend(), Some(art_config()));
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome, BuildOutcome::Built { assigned: 1, .. }));
        assert_eq!(packages(&o), 1);
        let stored = o.prefs().get(LAST_FINGERPRINT_KEY).unwrap();
        assert_eq!(stored.as_deref(), Some(Fingerprint::of(&art_config()).as_str()));
        assert!(o.prefs().get(LAST_BUILD_TIME_KEY).unwrap().is_some());
    }

    #[test]
    #[traced_test]
    fn test_unchanged_config_is_skipped() {
        let mut o = orchestrator(art_backend(), Some(art_config()));
        o.pre_packaging_hook().unwrap();
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome, BuildOutcome::UpToDate { .. }));
        assert_eq!(packages(&o), 1);
        assert!(!o.status().unwrap().needs_rebuild);
        assert!(logs_contain("No changes detected in config"));
    }

    #[test]
    fn test_changed_config_rebuilds() {
        let mut o = orchestrator(art_backend(), Some(art_config()));
        o.pre_packaging_hook().unwrap();

        let mut changed = art_config();
        changed.rules.push(GroupingRule::custom_label("Assets/Art", "ui"));
        o.configs_mut().save(&changed).unwrap();
        assert!(o.status().unwrap().needs_rebuild);

        assert!(matches!(o.pre_packaging_hook().unwrap(), BuildOutcome::Built { .. }));
        assert_eq!(packages(&o), 2);
    }

    #[test]
    fn test_packaging_failure_keeps_old_fingerprint() {
        let mut o = orchestrator(art_backend().failing_package(), Some(art_config()));
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome.failure(), Some(BuildFailure::Packaging(_))));
        assert_eq!(o.prefs().get(LAST_FINGERPRINT_KEY).unwrap(), None);
        assert!(o.status().unwrap().needs_rebuild);
    }

    #[test]
    fn test_assignment_failure_skips_packaging() {
        let backend = art_backend().failing_assign("Assets/Art/icons/sword.png");
        let mut o = orchestrator(backend, Some(art_config()));
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome.failure(), Some(BuildFailure::Assignment(_))));
        assert_eq!(packages(&o), 0);
        assert_eq!(o.prefs().get(LAST_FINGERPRINT_KEY).unwrap(), None);
    }

    #[test]
    fn test_empty_folder_list_touches_nothing() {
        let mut o = orchestrator(art_backend(), Some(AddressConfig::default()));
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome.failure(), Some(BuildFailure::EmptyFolderList)));
        assert!(o.backend().calls().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_missing_config_is_swallowed() {
        let mut o = orchestrator(art_backend(), None);
        let outcome = o.pre_packaging_hook().unwrap();

        assert!(matches!(outcome.failure(), Some(BuildFailure::ConfigMissing(_))));
        assert!(o.status().unwrap().needs_rebuild);
        assert!(logs_contain("Build step failed"));
    }

    #[test]
    fn test_propagate_policy_returns_error() {
        let mut o = orchestrator(art_backend().failing_package(), Some(art_config()))
            .with_failure_policy(FailurePolicy::Propagate);
        assert!(matches!(o.pre_packaging_hook(), Err(ShelfError::Build(_))));

        let mut o = orchestrator(art_backend(), None).with_failure_policy(FailurePolicy::Propagate);
        assert!(matches!(o.pre_packaging_hook(), Err(ShelfError::ConfigMissing(_))));
    }

    #[test]
    fn test_manual_run_ignores_fingerprint() {
        let mut o = orchestrator(art_backend(), Some(art_config()));
        assert!(o.pre_packaging_hook().unwrap().is_success());
        assert!(matches!(o.run_manual(), BuildOutcome::Built { .. }));
        assert_eq!(packages(&o), 2);
    }

    #[test]
    fn test_preference_write_failure() {
        let mut o = BuildOrchestrator::new(
            art_backend(),
            MemoryConfigStore::new(Some(art_config())),
            MemoryPreferenceStore::new().failing_writes(),
        );
        let outcome = o.run_manual();
        assert!(matches!(outcome.failure(), Some(BuildFailure::Preference(_))));
        assert_eq!(o.backend().count(|c| matches!(c, BackendCall::Package)), 1);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let config = AddressConfig::new(
            vec!["Assets/Art".to_string(), "Assets/Art".to_string()],
            vec![],
        );
        let mut o = orchestrator(art_backend(), Some(config));
        let outcome = o.run_manual();
        assert!(matches!(outcome.failure(), Some(BuildFailure::Config(_))));
        assert!(o.backend().calls().is_empty());
    }
}
