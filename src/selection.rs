use crate::catalog::Catalog;
use crate::naming::catalog_key;
use crate::replace::DesiredMap;
use crate::settings::SceneSettings;
use std::collections::BTreeMap;

pub type Choices = BTreeMap<String, String>;

pub fn resolve_base<'a>(catalog: &'a Catalog, name: &str) -> Option<&'a str> {
    let with_underscore = format!("{}_", name.trim_end_matches('_'));
    catalog
        .base_names()
        .find(|base| *base == name)
        .or_else(|| catalog.base_names().find(|base| *base == with_underscore))
}

pub fn default_choice(catalog: &Catalog, base: &str) -> Option<String> {
    catalog
        .recent_first(base)
        .into_iter()
        .next()
        .map(|candidate| candidate.path)
}

// `v003` or a bare `3`; the newest file wins when several share a label.
pub fn choose_version(catalog: &Catalog, base: &str, version: &str) -> Option<String> {
    let candidates = catalog.recent_first(base);
    if let Some(found) = candidates.iter().find(|c| c.version == version) {
        return Some(found.path.clone());
    }
    let number: u64 = version.trim_start_matches('v').parse().ok()?;
    candidates
        .into_iter()
        .find(|c| !c.version.is_empty() && c.version_number == number)
        .map(|candidate| candidate.path)
}

pub fn recent_choices(catalog: &Catalog) -> Choices {
    catalog
        .base_names()
        .filter_map(|base| Some((base.to_string(), default_choice(catalog, base)?)))
        .collect()
}

pub fn latest_choices(catalog: &Catalog) -> Choices {
    catalog
        .base_names()
        .filter_map(|base| Some((base.to_string(), catalog.latest(base)?.to_string())))
        .collect()
}

pub fn desired_map(loaded: &[String], choices: &Choices) -> DesiredMap {
    loaded
        .iter()
        .filter_map(|file| {
            let target = choices.get(&catalog_key(file))?;
            Some((file.clone(), Some(target.clone())))
        })
        .collect()
}

pub fn auto_update_map(loaded: &[String], choices: &Choices, settings: &SceneSettings) -> DesiredMap {
    let mut map = desired_map(loaded, choices);
    map.retain(|file, _| settings.wants_auto_update(&catalog_key(file)));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use filetime::{set_file_mtime, FileTime};
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn touch(root: &Path, name: &str, mtime: i64) {
        let path = root.join(name);
        fs::write(&path, b"//Maya ASCII").expect("write");
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).expect("mtime");
    }

    fn scene() -> Vec<String> {
        vec![
            "/scene/widget_v001.ma".to_string(),
            "/scene/gadget_v001.ma".to_string(),
        ]
    }

    #[test]
    fn choices_follow_recency_or_version() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "widget_v001.ma", 1_700_000_000);
        touch(dir.path(), "widget_v002.ma", 1_700_000_900);
        touch(dir.path(), "widget_v003.ma", 1_700_000_500);
        let catalog = build_catalog(dir.path(), &scene());

        let recent = recent_choices(&catalog);
        assert!(recent["widget_"].ends_with("widget_v002.ma"));
        let latest = latest_choices(&catalog);
        assert!(latest["widget_"].ends_with("widget_v003.ma"));
    }

    #[test]
    fn choose_version_accepts_tag_or_number() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "widget_v001.ma", 1_700_000_000);
        touch(dir.path(), "widget_v002.ma", 1_700_000_100);
        let catalog = build_catalog(dir.path(), &scene());

        let base = resolve_base(&catalog, "widget").expect("base");
        assert_eq!(base, "widget_");
        assert!(choose_version(&catalog, base, "v001")
            .expect("tag")
            .ends_with("widget_v001.ma"));
        assert!(choose_version(&catalog, base, "2")
            .expect("number")
            .ends_with("widget_v002.ma"));
        assert_eq!(choose_version(&catalog, base, "v009"), None);
        assert_eq!(resolve_base(&catalog, "gizmo"), None);
    }

    #[test]
    fn desired_map_keys_loaded_references_only() {
        let mut choices = Choices::new();
        choices.insert("widget_".to_string(), "/repo/widget_v002.ma".to_string());
        choices.insert("gizmo_".to_string(), "/repo/gizmo_v002.ma".to_string());

        let map = desired_map(&scene(), &choices);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map["/scene/widget_v001.ma"].as_deref(),
            Some("/repo/widget_v002.ma")
        );
    }

    #[test]
    fn auto_update_map_honors_policy() {
        let mut choices = Choices::new();
        choices.insert("widget_".to_string(), "/repo/widget_v002.ma".to_string());
        choices.insert("gadget_".to_string(), "/repo/gadget_v002.ma".to_string());
        let settings = SceneSettings {
            directory: "/repo".to_string(),
            files_to_update: vec!["gadget_".to_string()],
        };

        let map = auto_update_map(&scene(), &choices, &settings);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["/scene/gadget_v001.ma"]);
    }
}
