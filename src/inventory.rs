use crate::host::{HostError, RefNode, SceneHost};
use crate::naming::normalize_path;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub files: Vec<String>,
    pub skipped: Vec<SkippedReference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedReference {
    pub node: String,
    pub reason: String,
}

pub fn list_references<H: SceneHost + ?Sized>(host: &H) -> Result<Inventory, HostError> {
    let nodes = host.list_reference_nodes()?;
    let mut inventory = Inventory::default();

    for node in nodes {
        match host.resolve_reference_file(&node) {
            Ok(file) => inventory.files.push(normalize_path(&file)),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(node = %node, error = %err, "skipping invalid reference node");
                inventory.skipped.push(skipped(&node, &err));
            }
        }
    }

    debug!(
        resolved = inventory.files.len(),
        skipped = inventory.skipped.len(),
        "reference inventory complete"
    );
    Ok(inventory)
}

fn skipped(node: &RefNode, err: &HostError) -> SkippedReference {
    SkippedReference {
        node: node.as_str().to_string(),
        reason: err.to_string(),
    }
}
