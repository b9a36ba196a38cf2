use std::fmt;
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefNode(String);

impl RefNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("reference node {node} is invalid or unloaded")]
    InvalidNode { node: RefNode },
    #[error("host rejected rebinding {node} to {target}: {reason}")]
    RebindRejected {
        node: RefNode,
        target: String,
        reason: String,
    },
    #[error("scene host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, HostError::Unavailable(_))
    }
}

pub trait SceneHost {
    fn scene_path(&self) -> Result<String, HostError>;

    fn list_reference_nodes(&self) -> Result<Vec<RefNode>, HostError>;

    /// File the node is bound to, without any copy-number suffix.
    fn resolve_reference_file(&self, node: &RefNode) -> Result<String, HostError>;

    fn rebind_reference(&mut self, node: &RefNode, target: &str) -> Result<(), HostError>;

    fn suspend_redraw(&mut self) -> Result<(), HostError>;

    fn resume_redraw(&mut self) -> Result<(), HostError>;
}

/// Dropping the guard resumes redraw exactly once, including on early return
/// and unwinding.
pub struct RedrawSuspension<'a, H: SceneHost + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: SceneHost + ?Sized> RedrawSuspension<'a, H> {
    pub fn begin(host: &'a mut H) -> Result<Self, HostError> {
        host.suspend_redraw()?;
        Ok(Self { host })
    }
}

impl<H: SceneHost + ?Sized> Deref for RedrawSuspension<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: SceneHost + ?Sized> DerefMut for RedrawSuspension<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: SceneHost + ?Sized> Drop for RedrawSuspension<'_, H> {
    fn drop(&mut self) {
        if let Err(err) = self.host.resume_redraw() {
            warn!(error = %err, "failed to resume redraw");
        }
    }
}
