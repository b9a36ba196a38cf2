use once_cell::sync::Lazy;
use regex::Regex;

static VERSIONED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+_)(v[0-9]+)\.(\w+)$").expect("versioned name pattern"));

static LOOSE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v([0-9]+)").expect("loose version pattern"));

/// `widget_v003.ma` gives `("widget_", "v003")`; other names come back whole
/// with an empty tag.
///
/// Strict and anchored at the extension. `version_number` is loose and takes
/// the first `v<digits>` anywhere, so the two disagree on `v2_widget.ma`.
pub fn parse(filename: &str) -> (String, String) {
    match VERSIONED_NAME.captures(filename) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (filename.to_string(), String::new()),
    }
}

pub fn version_number(name: &str) -> u64 {
    let Some(caps) = LOOSE_VERSION.captures(name) else {
        return 0;
    };
    // Only digits reach here, so the parse can only fail on overflow.
    caps[1].parse::<u64>().unwrap_or(u64::MAX)
}

pub fn asset_base(path: &str) -> String {
    let (base, _) = parse(&file_name(path));
    base.trim_end_matches('_').to_string()
}

pub fn catalog_key(path: &str) -> String {
    parse(&file_name(path)).0
}

pub fn version_tag(path: &str) -> String {
    parse(&file_name(path)).1
}

pub fn file_name(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => normalized,
    }
}

// Lexical only; the filesystem is never consulted.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_base_and_version() {
        assert_eq!(
            parse("widget_v003.ma"),
            ("widget_".to_string(), "v003".to_string())
        );
        assert_eq!(
            parse("hero_rig_v12.mb"),
            ("hero_rig_".to_string(), "v12".to_string())
        );
        assert_eq!(parse("a_v0.x"), ("a_".to_string(), "v0".to_string()));
    }

    #[test]
    fn parse_holds_for_generated_names() {
        for base in ["widget", "prop_chair", "x", "set.dress"] {
            for number in [0u64, 1, 7, 42, 1000] {
                for ext in ["ma", "mb", "fbx", "abc"] {
                    let name = format!("{base}_v{number}.{ext}");
                    assert_eq!(
                        parse(&name),
                        (format!("{base}_"), format!("v{number}")),
                        "{name}"
                    );
                }
            }
        }
    }

    #[test]
    fn parse_keeps_unconventional_names_whole() {
        for name in [
            "widget.ma",
            "widget_v.ma",
            "widgetv001.ma",
            "_v001.ma",
            "widget_v001",
            "widget_v001.",
            "widget_V001.ma",
            "",
        ] {
            assert_eq!(parse(name), (name.to_string(), String::new()), "{name}");
        }
    }

    #[test]
    fn parse_takes_the_last_tag_before_the_extension() {
        assert_eq!(
            parse("widget_v001_v002.ma"),
            ("widget_v001_".to_string(), "v002".to_string())
        );
    }

    #[test]
    fn version_number_reads_first_tag() {
        assert_eq!(version_number("widget_v003.ma"), 3);
        assert_eq!(version_number("widget.ma"), 0);
        assert_eq!(version_number("widget_v010.ma"), 10);
        assert_eq!(version_number("v2_widget_v9.ma"), 2);
        assert_eq!(version_number("widgetv7.ma"), 7);
    }

    #[test]
    fn version_number_saturates_on_overflow() {
        assert_eq!(
            version_number("widget_v99999999999999999999999.ma"),
            u64::MAX
        );
    }

    #[test]
    fn loose_and_strict_extractors_can_disagree() {
        let name = "v2_widget.ma";
        assert_eq!(parse(name).1, "");
        assert_eq!(version_number(name), 2);

        let name = "widget_v1_final_v3.ma";
        assert_eq!(parse(name).1, "v3");
        assert_eq!(version_number(name), 1);
    }

    #[test]
    fn asset_base_ignores_separator_style() {
        assert_eq!(asset_base("a/b/widget_v002.ma"), "widget");
        assert_eq!(
            asset_base("a/b/widget_v002.ma"),
            asset_base("a\\b\\widget_v002.ma")
        );
        assert_eq!(asset_base("/repo/widget_v002.ma/"), "widget");
        assert_eq!(asset_base("C:\\proj\\.\\assets\\widget_v9.ma"), "widget");
    }

    #[test]
    fn asset_base_strips_every_trailing_underscore() {
        assert_eq!(asset_base("/repo/widget__v002.ma"), "widget");
    }

    #[test]
    fn asset_base_of_unversioned_file_is_the_file_name() {
        assert_eq!(asset_base("/scene/gadget.ma"), "gadget.ma");
    }

    #[test]
    fn catalog_key_keeps_trailing_underscore() {
        assert_eq!(catalog_key("/scene/widget_v001.ma"), "widget_");
        assert_eq!(catalog_key("widget.ma"), "widget.ma");
    }

    #[test]
    fn normalize_path_collapses_segments() {
        assert_eq!(normalize_path("/a//b/./c/"), "/a/b/c");
        assert_eq!(normalize_path("a\\b\\..\\c"), "a/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../a"), "../a");
        assert_eq!(normalize_path("C:\\proj\\file.ma"), "C:/proj/file.ma");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), ".");
    }
}
