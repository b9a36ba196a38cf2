use crate::catalog::{build_catalog, CatalogStatus, NotReady};
use crate::host::SceneHost;
use crate::inventory::{list_references, SkippedReference};
use crate::replace::{ApplyReport, ReplacementEngine};
use crate::selection::{auto_update_map, latest_choices};
use crate::settings::{SceneId, SettingsStore};
use anyhow::{Context, Result};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub enum AutoUpdateStatus {
    SettingsNotReady,
    CatalogNotReady(NotReady),
    NothingToUpdate,
    Applied(ApplyReport),
}

#[derive(Debug, Clone)]
pub struct AutoUpdateReport {
    pub scene: SceneId,
    pub skipped: Vec<SkippedReference>,
    pub status: AutoUpdateStatus,
}

pub fn run_auto_update<H, S>(host: &mut H, store: &S) -> Result<AutoUpdateReport>
where
    H: SceneHost + ?Sized,
    S: SettingsStore + ?Sized,
{
    let scene = SceneId::new(host.scene_path().context("query scene path")?);
    let settings = store.load(&scene).context("load scene settings")?;
    let mut report = AutoUpdateReport {
        scene: scene.clone(),
        skipped: Vec::new(),
        status: AutoUpdateStatus::SettingsNotReady,
    };
    if !settings.is_ready() {
        info!(scene = %scene, "auto-update skipped: no scan directory configured");
        return Ok(report);
    }
    if settings.files_to_update.is_empty() {
        report.status = AutoUpdateStatus::NothingToUpdate;
        return Ok(report);
    }

    let inventory = list_references(&*host).context("list scene references")?;
    report.skipped = inventory.skipped;

    let catalog = build_catalog(&settings.directory_path(), &inventory.files);
    if let CatalogStatus::NotReady(reason) = catalog.status() {
        warn!(scene = %scene, reason = %reason, "auto-update skipped");
        report.status = AutoUpdateStatus::CatalogNotReady(reason.clone());
        return Ok(report);
    }

    let desired = auto_update_map(&inventory.files, &latest_choices(&catalog), &settings);
    if desired.is_empty() {
        report.status = AutoUpdateStatus::NothingToUpdate;
        return Ok(report);
    }

    let applied = ReplacementEngine::new(host)
        .apply(&desired)
        .context("apply auto-update")?;
    info!(
        scene = %scene,
        rebound = applied.rebound.len(),
        failed = applied.failures.len(),
        "auto-update finished"
    );
    report.status = AutoUpdateStatus::Applied(applied);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeHost;
    use crate::naming::normalize_path;
    use crate::settings::{MemorySettingsStore, SceneSettings};
    use std::fs;
    use tempfile::tempdir;

    fn repo_with(names: &[&str]) -> tempfile::TempDir {
        let dir = tempdir().expect("tempdir");
        for name in names {
            fs::write(dir.path().join(name), b"//Maya ASCII").expect("write");
        }
        dir
    }

    #[test]
    fn upgrades_only_opted_in_assets_to_highest_version() {
        let repo = repo_with(&[
            "widget_v001.ma",
            "widget_v003.ma",
            "widget_v002.ma",
            "gadget_v001.ma",
            "gadget_v002.ma",
        ]);
        let mut host = FakeHost::with_refs(&[
            ("widgetRN", "/scene/widget_v001.ma"),
            ("gadgetRN", "/scene/gadget_v001.ma"),
        ]);
        let store = MemorySettingsStore::new();
        store
            .save(
                &SceneId::new(host.scene.clone()),
                &SceneSettings {
                    directory: repo.path().to_string_lossy().to_string(),
                    files_to_update: vec!["widget_".to_string()],
                },
            )
            .expect("save");

        let report = run_auto_update(&mut host, &store).expect("auto-update");
        let applied = match report.status {
            AutoUpdateStatus::Applied(applied) => applied,
            other => panic!("expected applied, got {other:?}"),
        };
        assert_eq!(applied.rebound.len(), 1);

        let root = normalize_path(&repo.path().to_string_lossy());
        assert_eq!(host.file_of("widgetRN"), format!("{root}/widget_v003.ma"));
        assert_eq!(host.file_of("gadgetRN"), "/scene/gadget_v001.ma");
    }

    #[test]
    fn missing_settings_leave_scene_alone() {
        let mut host = FakeHost::with_refs(&[("widgetRN", "/scene/widget_v001.ma")]);
        let store = MemorySettingsStore::new();
        let report = run_auto_update(&mut host, &store).expect("auto-update");
        assert!(matches!(report.status, AutoUpdateStatus::SettingsNotReady));
        assert_eq!(host.suspend_calls, 0);
    }

    #[test]
    fn vanished_directory_is_reported() {
        let mut host = FakeHost::with_refs(&[("widgetRN", "/scene/widget_v001.ma")]);
        let store = MemorySettingsStore::new();
        store
            .save(
                &SceneId::new(host.scene.clone()),
                &SceneSettings {
                    directory: "/definitely/not/here".to_string(),
                    files_to_update: vec!["widget_".to_string()],
                },
            )
            .expect("save");
        let report = run_auto_update(&mut host, &store).expect("auto-update");
        assert!(matches!(
            report.status,
            AutoUpdateStatus::CatalogNotReady(NotReady::Missing(_))
        ));
        assert!(host.rebind_calls.is_empty());
    }

    #[test]
    fn empty_policy_does_nothing() {
        let repo = repo_with(&["widget_v002.ma"]);
        let mut host = FakeHost::with_refs(&[("widgetRN", "/scene/widget_v001.ma")]);
        let store = MemorySettingsStore::new();
        store
            .save(
                &SceneId::new(host.scene.clone()),
                &SceneSettings {
                    directory: repo.path().to_string_lossy().to_string(),
                    files_to_update: Vec::new(),
                },
            )
            .expect("save");
        let report = run_auto_update(&mut host, &store).expect("auto-update");
        assert!(matches!(report.status, AutoUpdateStatus::NothingToUpdate));
        assert_eq!(host.file_of("widgetRN"), "/scene/widget_v001.ma");
    }
}
