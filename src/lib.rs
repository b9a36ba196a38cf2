pub mod catalog;
pub mod host;
pub mod inventory;
pub mod logging;
pub mod manifest;
pub mod naming;
pub mod replace;
pub mod selection;
pub mod settings;
pub mod startup;

pub use catalog::{build_catalog, Catalog, CatalogStatus, NotReady};
pub use host::{HostError, RedrawSuspension, RefNode, SceneHost};
pub use inventory::{list_references, Inventory};
pub use replace::{ApplyReport, DesiredMap, ReplacementEngine};
pub use settings::{JsonSettingsStore, SceneId, SceneSettings, SettingsStore};
