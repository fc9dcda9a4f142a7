//! Reads type definitions from JSON: a list of
//! `{"name": .., "fields": [{"name": .., "type": .., "no_persist": .., "no_http": ..}]}`.

use std::fs;
use std::path::Path;
use crate::core::{DbError, Result};
use crate::scalar::ScalarRegistry;
use super::descriptor::TypeDef;
use super::registry::Registry;

pub fn parse_types(json: &str) -> Result<Vec<TypeDef>> {
    serde_json::from_str(json)
        .map_err(|e| DbError::configuration(format!("Invalid type definitions: {}", e)))
}

pub fn read_types(path: impl AsRef<Path>) -> Result<Vec<TypeDef>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        DbError::configuration(format!("Cannot read type definitions from {}: {}", path.display(), e))
    })?;
    parse_types(&text)
}

/// Registry with the built-in scalars and the definitions in `path`,
/// validated.
pub fn load_registry(path: impl AsRef<Path>) -> Result<Registry> {
    let mut registry = Registry::new(ScalarRegistry::new());
    for def in read_types(path)? {
        registry.register(def)?;
    }
    registry.validate()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEFS: &str = r#"[
        {"name": "Owner", "fields": [
            {"name": "name", "type": "String"},
            {"name": "pets", "type": "[Pet]"}
        ]},
        {"name": "Pet", "fields": [
            {"name": "name", "type": "String"},
            {"name": "owner", "type": "Owner"}
        ]}
    ]"#;

    #[test]
    fn test_load_registry_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFS.as_bytes()).unwrap();

        let registry = load_registry(file.path()).unwrap();
        assert_eq!(registry.type_names(), vec!["Owner", "Pet"]);
        assert_eq!(registry.describe("Pet").unwrap().associations.len(), 1);
    }

    #[test]
    fn test_bad_input_is_configuration_error() {
        assert!(parse_types("{").unwrap_err().is_configuration());
        assert!(read_types("/definitely/not/here.json").unwrap_err().is_configuration());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"name": "A", "fields": [{"name": "x", "type": "Blob"}]}]"#)
            .unwrap();
        assert!(load_registry(file.path()).unwrap_err().is_configuration());
    }
}
