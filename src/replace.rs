use crate::host::{HostError, RedrawSuspension, RefNode, SceneHost};
use crate::naming::{asset_base, normalize_path};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

// `None` or an empty target leaves the asset alone.
pub type DesiredMap = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rebind {
    pub node: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebindFailure {
    pub node: String,
    pub target: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub rebound: Vec<Rebind>,
    pub failures: Vec<RebindFailure>,
    pub untouched: usize,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ReplacementEngine<'h, H: SceneHost + ?Sized> {
    host: &'h mut H,
}

impl<'h, H: SceneHost + ?Sized> ReplacementEngine<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }

    /// A failing node is reported and the batch goes on. Only
    /// `HostError::Unavailable` ends it early; completed swaps are kept.
    pub fn apply(&mut self, desired: &DesiredMap) -> Result<ApplyReport, HostError> {
        let table = replacement_table(desired);
        let mut report = ApplyReport::default();
        if table.is_empty() {
            debug!("no replacements requested");
            return Ok(report);
        }

        let nodes = self.host.list_reference_nodes()?;
        let mut batch = RedrawSuspension::begin(&mut *self.host)?;

        for node in nodes {
            let current = match batch.resolve_reference_file(&node) {
                Ok(file) => file,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(node = %node, error = %err, "cannot resolve reference for update");
                    report.failures.push(failure(&node, None, &err));
                    continue;
                }
            };

            let Some(target) = table.get(&asset_base(&current)) else {
                report.untouched += 1;
                continue;
            };

            match batch.rebind_reference(&node, target) {
                Ok(()) => {
                    info!(node = %node, from = %current, to = %target, "reference updated");
                    report.rebound.push(Rebind {
                        node: node.as_str().to_string(),
                        from: normalize_path(&current),
                        to: target.clone(),
                    });
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(node = %node, target = %target, error = %err, "error updating reference");
                    report.failures.push(failure(&node, Some(target), &err));
                }
            }
        }

        drop(batch);
        debug!(
            rebound = report.rebound.len(),
            failed = report.failures.len(),
            "reference update batch finished"
        );
        Ok(report)
    }
}

// Later keys win when two map to the same asset.
fn replacement_table(desired: &DesiredMap) -> HashMap<String, String> {
    let mut table = HashMap::new();
    for (current, target) in desired {
        let Some(target) = target.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        table.insert(asset_base(current), normalize_path(target));
    }
    table
}

fn failure(node: &RefNode, target: Option<&String>, err: &HostError) -> RebindFailure {
    RebindFailure {
        node: node.as_str().to_string(),
        target: target.cloned(),
        error: err.to_string(),
    }
}
