//! Package snapshot loading.
//!
//! A snapshot file is JSON: either a bare array of objects or an object with
//! an `objects` array. Each object uses the flat wire shape of
//! [`pkgmerge_core::Object`]:
//!
//! ```json
//! [
//!   {"uuid": "r-1", "name": "calc", "object_type": "expression_rule",
//!    "version_uuid": "v1", "code": "cons!LIMIT * 2"}
//! ]
//! ```

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use serde_json::Value;

use pkgmerge_core::{Object, Package};

/// Parse a package snapshot from JSON text.
///
/// # Errors
/// Returns an error on malformed JSON, an object that does not match the
/// wire shape (the message names the object index and the bad field), or a
/// structurally invalid package (missing identity fields, duplicate UUIDs).
pub fn parse_package(json: &str) -> Result<Package> {
    let value: Value = serde_json::from_str(json).context("package file is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("objects") {
            Some(Value::Array(items)) => items,
            Some(_) => bail!("\"objects\" must be an array of objects"),
            None => bail!(
                "expected a JSON array of objects or {{\"objects\": [...]}}\n  \
                 To fix: wrap the objects in an array."
            ),
        },
        _ => bail!("expected a JSON array of objects or {{\"objects\": [...]}}"),
    };

    let objects = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<Object>(item).with_context(|| format!("object #{i}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Package::new(objects)?)
}

/// Load a package snapshot from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or does not hold a valid
/// package.
pub fn load_package(path: &Path) -> Result<Package> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read package file {}", path.display()))?;
    let package =
        parse_package(&text).with_context(|| format!("invalid package file {}", path.display()))?;
    tracing::debug!(path = %path.display(), objects = package.len(), "package loaded");
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array_parses() {
        let p = parse_package(
            r#"[{"uuid": "a", "name": "alpha", "object_type": "expression_rule", "version_uuid": "v1"}]"#,
        )
        .unwrap();
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn wrapped_object_parses() {
        let p = parse_package(r#"{"objects": []}"#).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn duplicate_uuid_is_rejected() {
        let obj = r#"{"uuid": "a", "name": "alpha", "object_type": "constant", "version_uuid": "v1"}"#;
        let err = parse_package(&format!("[{obj}, {obj}]")).unwrap_err();
        assert!(format!("{err:#}").contains('a'));
    }

    #[test]
    fn missing_field_is_named_with_object_index() {
        let err = parse_package(
            r#"[{"uuid": "a", "name": "alpha", "object_type": "constant", "version_uuid": "v1"},
                {"uuid": "b", "name": "beta", "version_uuid": "v1"}]"#,
        )
        .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("object #1"), "{message}");
        assert!(message.contains("object_type"), "{message}");
    }

    #[test]
    fn objects_key_must_hold_an_array() {
        let err = parse_package(r#"{"objects": 3}"#).unwrap_err();
        assert!(err.to_string().contains("objects"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(parse_package("{").is_err());
        assert!(parse_package("42").is_err());
    }
}
