use crate::host::{HostError, RefNode, SceneHost};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(default)]
    pub scene: String,
    #[serde(default)]
    pub references: Vec<ManifestReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestReference {
    pub node: String,
    pub file: String,
    #[serde(default = "default_true")]
    pub loaded: bool,
}

#[derive(Debug)]
pub struct ManifestScene {
    path: PathBuf,
    manifest: SceneManifest,
    dirty: bool,
    redraw_suspended: bool,
}

impl ManifestScene {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read scene manifest {}", path.display()))?;
        let manifest: SceneManifest =
            serde_json::from_str(&raw).context("parse scene manifest")?;
        Ok(Self {
            path: path.to_path_buf(),
            manifest,
            dirty: false,
            redraw_suspended: false,
        })
    }

    pub fn save(&mut self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.manifest).context("serialize scene manifest")?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, raw).context("write scene manifest temp")?;
        fs::rename(&temp, &self.path).context("finalize scene manifest")?;
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn redraw_suspended(&self) -> bool {
        self.redraw_suspended
    }

    pub fn manifest(&self) -> &SceneManifest {
        &self.manifest
    }

    fn reference(&self, node: &RefNode) -> Result<&ManifestReference, HostError> {
        self.manifest
            .references
            .iter()
            .find(|entry| entry.node == node.as_str())
            .ok_or_else(|| HostError::InvalidNode { node: node.clone() })
    }
}

impl SceneHost for ManifestScene {
    fn scene_path(&self) -> Result<String, HostError> {
        if self.manifest.scene.trim().is_empty() {
            return Ok(self.path.to_string_lossy().to_string());
        }
        Ok(self.manifest.scene.clone())
    }

    fn list_reference_nodes(&self) -> Result<Vec<RefNode>, HostError> {
        Ok(self
            .manifest
            .references
            .iter()
            .map(|entry| RefNode::new(entry.node.clone()))
            .collect())
    }

    fn resolve_reference_file(&self, node: &RefNode) -> Result<String, HostError> {
        let entry = self.reference(node)?;
        if !entry.loaded {
            return Err(HostError::InvalidNode { node: node.clone() });
        }
        Ok(split_copy_number(&entry.file).0.to_string())
    }

    fn rebind_reference(&mut self, node: &RefNode, target: &str) -> Result<(), HostError> {
        if !Path::new(target).is_file() {
            return Err(HostError::RebindRejected {
                node: node.clone(),
                target: target.to_string(),
                reason: "file not found".to_string(),
            });
        }
        let entry = self
            .manifest
            .references
            .iter_mut()
            .find(|entry| entry.node == node.as_str())
            .ok_or_else(|| HostError::InvalidNode { node: node.clone() })?;
        let suffix = split_copy_number(&entry.file).1.to_string();
        entry.file = format!("{target}{suffix}");
        entry.loaded = true;
        self.dirty = true;
        Ok(())
    }

    fn suspend_redraw(&mut self) -> Result<(), HostError> {
        self.redraw_suspended = true;
        debug!("redraw suspended");
        Ok(())
    }

    fn resume_redraw(&mut self) -> Result<(), HostError> {
        self.redraw_suspended = false;
        debug!("redraw resumed");
        Ok(())
    }
}

// `widget_v001.ma{2}` -> (`widget_v001.ma`, `{2}`)
fn split_copy_number(file: &str) -> (&str, &str) {
    if let Some(open) = file.rfind('{') {
        let tail = &file[open..];
        let is_copy = tail
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()));
        if is_copy {
            return (&file[..open], tail);
        }
    }
    (file, "")
}

fn default_true() -> bool {
    true
}
