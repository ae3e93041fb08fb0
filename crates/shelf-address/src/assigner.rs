//! Address assignment: plan every resource's group/address/label, then apply

use crate::backend::AssetBackend;
use crate::config::AddressConfig;
use crate::resolver::{extension, GroupResolver, GroupTarget};
use serde::Serialize;
use shelf_core::{Result, ShelfError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// One resource's intended placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentRecord {
    pub resource: String,
    pub group: GroupTarget,
    pub address: String,
    pub label: Option<String>,
}

/// The full set of assignments for one pass, computed before anything is mutated
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentPlan {
    pub records: Vec<AssignmentRecord>,
}

impl AssignmentPlan {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct named groups the plan needs
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter_map(|r| r.group.name())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Why an apply pass stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentFailure {
    /// The backend rejected one record; the records after it were not attempted
    Record {
        record: AssignmentRecord,
        reason: String,
    },
    /// Every record was applied but the batched persist failed
    Persist { reason: String },
}

/// Outcome of applying a plan.
///
/// Applied records stay applied when a later record fails; the report says
/// exactly which records went through and which were never attempted.
#[derive(Debug, Clone, Default)]
pub struct AssignmentReport {
    pub applied: Vec<AssignmentRecord>,
    pub skipped: Vec<AssignmentRecord>,
    pub failure: Option<AssignmentFailure>,
    pub groups_created: Vec<String>,
}

impl AssignmentReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Convert a failed report into the matching error
    pub fn into_result(self) -> Result<Self> {
        match &self.failure {
            None => Ok(self),
            Some(AssignmentFailure::Record { record, reason }) => Err(ShelfError::Assignment {
                resource: record.resource.clone(),
                reason: reason.clone(),
            }),
            Some(AssignmentFailure::Persist { reason }) => {
                Err(ShelfError::Backend(format!("persist failed: {}", reason)))
            }
        }
    }
}

/// Logical address of a resource: its path relative to the folder, extension stripped
pub fn logical_address(resource: &str, folder: &str) -> String {
    let relative = resource
        .strip_prefix(folder)
        .unwrap_or(resource)
        .trim_start_matches(['/', '\\']);

    match extension(relative) {
        Some(ext) => relative[..relative.len() - ext.len() - 1].to_string(),
        None => relative.to_string(),
    }
}

/// Drives the backend through one assignment pass
pub struct AddressAssigner<'a, B: AssetBackend> {
    backend: &'a mut B,
}

impl<'a, B: AssetBackend> AddressAssigner<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Enumerate and resolve every resource without mutating the backend.
    ///
    /// Fails with [`ShelfError::EmptyFolderList`] before touching the backend
    /// when no folders are configured.
    pub fn plan(&self, config: &AddressConfig) -> Result<AssignmentPlan> {
        if config.folders.is_empty() {
            return Err(ShelfError::EmptyFolderList);
        }

        let resolver = GroupResolver::new(&config.rules);
        let mut records: Vec<AssignmentRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for folder in &config.folders {
            let resources = self.backend.enumerate(folder)?;
            debug!("{} resource(s) under {}", resources.len(), folder);

            for resource in resources {
                let resolution = resolver.resolve(&resource);
                let record = AssignmentRecord {
                    address: logical_address(&resource, folder),
                    group: resolution.group,
                    label: resolution.label,
                    resource,
                };

                // Overlapping folders: the later folder decides, as a sequential pass would.
                if let Some(&i) = index.get(&record.resource) {
                    debug!("{} listed by more than one folder", record.resource);
                    records[i] = record;
                } else {
                    index.insert(record.resource.clone(), records.len());
                    records.push(record);
                }
            }
        }

        let plan = AssignmentPlan { records };
        validate(&plan)?;
        Ok(plan)
    }

    /// Apply a plan record by record, then persist once.
    ///
    /// Stops at the first rejected record without rolling back what was applied.
    pub fn apply(&mut self, plan: AssignmentPlan) -> AssignmentReport {
        let mut report = AssignmentReport::default();
        let default_group = self.backend.default_group();
        let mut records = plan.records.into_iter();

        for record in records.by_ref() {
            match self.apply_record(&record, &default_group, &mut report.groups_created) {
                Ok(()) => report.applied.push(record),
                Err(e) => {
                    error!("Assignment of {} failed: {}", record.resource, e);
                    report.failure = Some(AssignmentFailure::Record {
                        record,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
        report.skipped.extend(records);

        if report.failure.is_some() {
            warn!(
                "Assignment aborted: {} applied, {} not attempted",
                report.applied.len(),
                report.skipped.len()
            );
            return report;
        }

        if let Err(e) = self.backend.persist() {
            error!("Persisting assignments failed: {}", e);
            report.failure = Some(AssignmentFailure::Persist {
                reason: e.to_string(),
            });
            return report;
        }

        info!(
            "Address assignment completed: {} resource(s), {} new group(s)",
            report.applied.len(),
            report.groups_created.len()
        );
        report
    }

    /// Plan and apply in one go
    pub fn assign_all(&mut self, config: &AddressConfig) -> Result<AssignmentReport> {
        let plan = self.plan(config)?;
        Ok(self.apply(plan))
    }

    fn apply_record(
        &mut self,
        record: &AssignmentRecord,
        default_group: &str,
        groups_created: &mut Vec<String>,
    ) -> Result<()> {
        let group = match &record.group {
            GroupTarget::Default => default_group,
            GroupTarget::Named(name) => {
                if !self.backend.has_group(name) {
                    self.backend.create_group(name)?;
                    groups_created.push(name.clone());
                }
                name.as_str()
            }
        };

        self.backend.assign(&record.resource, group, &record.address)?;

        if let Some(label) = &record.label {
            if !self.backend.labels_of(&record.resource).contains(label) {
                self.backend.attach_label(&record.resource, label)?;
            }
        }
        Ok(())
    }
}

fn validate(plan: &AssignmentPlan) -> Result<()> {
    let mut problems = Vec::new();

    for record in &plan.records {
        if record.address.is_empty() {
            problems.push(format!("{} resolves to an empty address", record.resource));
        }
        if record.group.name().is_some_and(str::is_empty) {
            problems.push(format!("{} resolves to an unnamed group", record.resource));
        }
        if record.label.as_deref().is_some_and(str::is_empty) {
            problems.push(format!("{} resolves to an empty label", record.resource));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShelfError::Validation(problems.join("; ")))
    }
}
