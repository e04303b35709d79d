//! Manifest tree parsing

use serde_json::Value;
use tracing::warn;

/// Collect every leaf path named by a nested manifest object
///
/// Object keys are path segments: a key with an empty value (`null`,
/// `false`, `""`, `0`) is a leaf at the composed path, a key with an
/// object value is a directory to recurse into. Anything else is skipped.
/// Composed paths are rooted (`/pkg/v1`) and keep the manifest's casing.
pub fn collect_leaves(tree: &Value) -> Vec<String> {
    let mut leaves = Vec::new();
    walk("", tree, &mut leaves);
    leaves
}

fn walk(base: &str, node: &Value, leaves: &mut Vec<String>) {
    let Some(object) = node.as_object() else {
        return;
    };
    for (name, value) in object {
        let Some(segment) = valid_segment(name) else {
            warn!(segment = %name, "skipping invalid manifest segment");
            continue;
        };
        let path = format!("{}/{}", base, segment);
        if is_leaf_marker(value) {
            leaves.push(path);
        } else if value.is_object() {
            walk(&path, value, leaves);
        }
    }
}

/// A usable path segment: non-empty after trimming, not hidden, and free
/// of separators that would escape the storage namespace
fn valid_segment(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') || trimmed.contains('/') {
        return None;
    }
    Some(trimmed)
}

fn is_leaf_marker(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_leaf() {
        let tree = json!({"pkg": {"v1": null}});
        assert_eq!(collect_leaves(&tree), vec!["/pkg/v1"]);
    }

    #[test]
    fn test_nested_directories_compose_paths() {
        let tree = json!({
            "static": {
                "html": {"index.html": null, "about.html": ""},
                "app.js": null
            },
            "robots.txt": null
        });
        let mut leaves = collect_leaves(&tree);
        leaves.sort();
        assert_eq!(
            leaves,
            vec![
                "/robots.txt",
                "/static/app.js",
                "/static/html/about.html",
                "/static/html/index.html",
            ]
        );
    }

    #[test]
    fn test_invalid_segments_are_skipped() {
        let tree = json!({
            "": null,
            "   ": null,
            ".hidden": null,
            "a/b": null,
            "ok": null
        });
        assert_eq!(collect_leaves(&tree), vec!["/ok"]);
    }

    #[test]
    fn test_segment_names_are_trimmed() {
        let tree = json!({" pkg ": {"v1": null}});
        assert_eq!(collect_leaves(&tree), vec!["/pkg/v1"]);
    }

    #[test]
    fn test_non_empty_scalars_are_not_leaves() {
        let tree = json!({
            "skipped-string": "x",
            "skipped-number": 7,
            "skipped-bool": true,
            "skipped-array": ["v1"],
            "leaf-zero": 0,
            "leaf-false": false
        });
        let mut leaves = collect_leaves(&tree);
        leaves.sort();
        assert_eq!(leaves, vec!["/leaf-false", "/leaf-zero"]);
    }

    #[test]
    fn test_non_object_root_yields_nothing() {
        assert!(collect_leaves(&json!(null)).is_empty());
        assert!(collect_leaves(&json!(["a"])).is_empty());
        assert!(collect_leaves(&json!("a")).is_empty());
    }
}
