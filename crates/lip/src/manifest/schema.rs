//! Structural checks on raw `tooth.json` documents
//!
//! Runs on the untyped JSON value before it is deserialized so that every
//! problem in a document is reported at once, with its JSON location.

use serde_json::{Map, Value};

const COMMAND_KEYS: [&str; 4] = ["pre_install", "post_install", "pre_uninstall", "post_uninstall"];

/// Collects schema violations while walking a document
#[derive(Default)]
struct Checker {
    errors: Vec<String>,
}

impl Checker {
    fn error(&mut self, location: &str, message: &str) {
        self.errors.push(format!("{}: {}", location, message));
    }

    fn object<'v>(&mut self, value: &'v Value, location: &str) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(object) => Some(object),
            None => {
                self.error(location, "expected an object");
                None
            }
        }
    }

    fn string(&mut self, value: &Value, location: &str) {
        if !value.is_string() {
            self.error(location, "expected a string");
        }
    }

    fn string_array(&mut self, value: &Value, location: &str) {
        match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.string(item, &format!("{}[{}]", location, i));
                }
            }
            None => self.error(location, "expected an array of strings"),
        }
    }

    fn string_map(&mut self, value: &Value, location: &str) {
        if let Some(object) = self.object(value, location) {
            for (key, item) in object {
                self.string(item, &format!("{}.{}", location, key));
            }
        }
    }

    fn required<'v>(
        &mut self,
        object: &'v Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Option<&'v Value> {
        let value = object.get(key);
        if value.is_none() {
            self.error(location, &format!("missing required field '{}'", key));
        }
        value
    }

    fn info(&mut self, value: &Value, location: &str) {
        let Some(object) = self.object(value, location) else {
            return;
        };
        for (key, item) in object {
            let item_location = format!("{}.{}", location, key);
            match key.as_str() {
                "name" | "description" | "author" | "source" => self.string(item, &item_location),
                "tags" => self.string_array(item, &item_location),
                _ => self.error(&item_location, "unknown field"),
            }
        }
    }

    fn commands(&mut self, value: &Value, location: &str) {
        let Some(object) = self.object(value, location) else {
            return;
        };
        for (key, item) in object {
            let item_location = format!("{}.{}", location, key);
            if COMMAND_KEYS.contains(&key.as_str()) {
                self.string_array(item, &item_location);
            } else {
                self.error(&item_location, "unknown field");
            }
        }
    }

    fn files(&mut self, value: &Value, location: &str) {
        let Some(object) = self.object(value, location) else {
            return;
        };
        for (key, item) in object {
            let item_location = format!("{}.{}", location, key);
            match key.as_str() {
                "place" => self.place(item, &item_location),
                "preserve" | "remove" => self.string_array(item, &item_location),
                _ => self.error(&item_location, "unknown field"),
            }
        }
    }

    fn place(&mut self, value: &Value, location: &str) {
        let Some(items) = value.as_array() else {
            self.error(location, "expected an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_location = format!("{}[{}]", location, i);
            let Some(object) = self.object(item, &item_location) else {
                continue;
            };
            for key in ["src", "dest"] {
                if let Some(field) = self.required(object, key, &item_location) {
                    self.string(field, &format!("{}.{}", item_location, key));
                }
            }
        }
    }

    fn platforms(&mut self, value: &Value, location: &str) {
        let Some(items) = value.as_array() else {
            self.error(location, "expected an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_location = format!("{}[{}]", location, i);
            let Some(object) = self.object(item, &item_location) else {
                continue;
            };
            if let Some(goos) = self.required(object, "goos", &item_location) {
                self.string(goos, &format!("{}.goos", item_location));
            }
            for (key, field) in object {
                let field_location = format!("{}.{}", item_location, key);
                match key.as_str() {
                    "goos" => {}
                    "goarch" => self.string(field, &field_location),
                    "commands" => self.commands(field, &field_location),
                    "dependencies" | "prerequisites" => self.string_map(field, &field_location),
                    "files" => self.files(field, &field_location),
                    _ => self.error(&field_location, "unknown field"),
                }
            }
        }
    }

    /// Each dependency is a non-empty array of alternative range sets
    fn v1_dependencies(&mut self, value: &Value, location: &str) {
        let Some(object) = self.object(value, location) else {
            return;
        };
        for (repo, item) in object {
            let item_location = format!("{}.{}", location, repo);
            match item.as_array() {
                Some(groups) if !groups.is_empty() => {
                    for (i, group) in groups.iter().enumerate() {
                        self.string_array(group, &format!("{}[{}]", item_location, i));
                    }
                }
                _ => self.error(&item_location, "expected a non-empty array"),
            }
        }
    }

    fn v1_placement(&mut self, value: &Value, location: &str) {
        let Some(items) = value.as_array() else {
            self.error(location, "expected an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_location = format!("{}[{}]", location, i);
            let Some(object) = self.object(item, &item_location) else {
                continue;
            };
            for key in ["source", "destination"] {
                self.required(object, key, &item_location);
            }
            for key in ["source", "destination", "GOOS", "GOARCH"] {
                if let Some(field) = object.get(key) {
                    self.string(field, &format!("{}.{}", item_location, key));
                }
            }
        }
    }

    fn v1_commands(&mut self, value: &Value, location: &str) {
        let Some(items) = value.as_array() else {
            self.error(location, "expected an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let item_location = format!("{}[{}]", location, i);
            let Some(object) = self.object(item, &item_location) else {
                continue;
            };
            for key in ["type", "commands", "GOOS"] {
                self.required(object, key, &item_location);
            }
            if let Some(kind) = object.get("type") {
                if !matches!(kind.as_str(), Some("install" | "uninstall")) {
                    self.error(
                        &format!("{}.type", item_location),
                        "expected \"install\" or \"uninstall\"",
                    );
                }
            }
            if let Some(commands) = object.get("commands") {
                self.string_array(commands, &format!("{}.commands", item_location));
            }
            for key in ["GOOS", "GOARCH"] {
                if let Some(field) = object.get(key) {
                    self.string(field, &format!("{}.{}", item_location, key));
                }
            }
        }
    }

    fn finish(self) -> Result<(), Vec<String>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Check a format version 1 document, returning every violation found
///
/// Version 1 tolerates unknown fields; only the known ones are checked.
pub(crate) fn check_v1_document(document: &Value) -> Result<(), Vec<String>> {
    let mut checker = Checker::default();

    if let Some(root) = checker.object(document, "$") {
        for key in ["format_version", "tooth", "version"] {
            checker.required(root, key, "$");
        }

        for (key, value) in root {
            let location = format!("$.{}", key);
            match key.as_str() {
                "format_version" => {
                    if value.as_u64() != Some(1) {
                        checker.error(&location, "expected 1");
                    }
                }
                "tooth" | "version" => checker.string(value, &location),
                "dependencies" => checker.v1_dependencies(value, &location),
                "information" => {
                    checker.object(value, &location);
                }
                "placement" => checker.v1_placement(value, &location),
                "possession" => checker.string_array(value, &location),
                "commands" => checker.v1_commands(value, &location),
                _ => {}
            }
        }
    }

    checker.finish()
}

/// Check a current-format document, returning every violation found
pub(crate) fn check_document(document: &Value) -> Result<(), Vec<String>> {
    let mut checker = Checker::default();

    if let Some(root) = checker.object(document, "$") {
        for key in ["format_version", "tooth", "version", "info"] {
            checker.required(root, key, "$");
        }

        for (key, value) in root {
            let location = format!("$.{}", key);
            match key.as_str() {
                "format_version" => {
                    if !value.is_u64() {
                        checker.error(&location, "expected an integer");
                    }
                }
                "tooth" | "version" => checker.string(value, &location),
                "info" => checker.info(value, &location),
                "commands" => checker.commands(value, &location),
                "dependencies" | "prerequisites" => checker.string_map(value, &location),
                "files" => checker.files(value, &location),
                "platforms" => checker.platforms(value, &location),
                _ => checker.error(&location, "unknown field"),
            }
        }
    }

    checker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document_passes() {
        let document = json!({
            "format_version": 2,
            "tooth": "example.com/org/tooth",
            "version": "1.0.0",
            "info": { "name": "x", "description": "y", "author": "z", "tags": [] }
        });
        assert!(check_document(&document).is_ok());
    }

    #[test]
    fn test_reports_all_violations() {
        let document = json!({
            "format_version": 2,
            "version": 1,
            "info": { "tags": "not-an-array" },
            "files": { "place": [{ "src": "a" }] },
            "platforms": [{ "goarch": "amd64" }],
            "homepage": "https://example.com"
        });
        let errors = check_document(&document).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("missing required field 'tooth'")));
        assert!(errors.iter().any(|e| e.starts_with("$.version")));
        assert!(errors.iter().any(|e| e.starts_with("$.info.tags")));
        assert!(errors.iter().any(|e| e.contains("missing required field 'dest'")));
        assert!(errors.iter().any(|e| e.contains("missing required field 'goos'")));
        assert!(errors.iter().any(|e| e.starts_with("$.homepage")));
    }

    #[test]
    fn test_v1_document_reports_located_errors() {
        let document = json!({
            "format_version": 1,
            "tooth": "example.com/org/legacy",
            "dependencies": { "example.com/org/dep": [] },
            "placement": [{ "source": "a", "GOOS": 1 }],
            "possession": "data/",
            "commands": [{ "type": "upgrade", "commands": ["x"], "GOOS": "linux" }],
            "homepage": "https://example.com"
        });
        let errors = check_v1_document(&document).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("missing required field 'version'")));
        assert!(errors.iter().any(|e| e.starts_with("$.dependencies.example.com/org/dep")));
        assert!(errors.iter().any(|e| e.contains("missing required field 'destination'")));
        assert!(errors.iter().any(|e| e.starts_with("$.placement[0].GOOS")));
        assert!(errors.iter().any(|e| e.starts_with("$.possession")));
        assert!(errors.iter().any(|e| e.starts_with("$.commands[0].type")));
        // Unknown fields are tolerated in version 1
        assert!(!errors.iter().any(|e| e.starts_with("$.homepage")));
    }

    #[test]
    fn test_v1_minimal_document_passes() {
        let document = json!({
            "format_version": 1,
            "tooth": "example.com/org/legacy",
            "version": "1.0.0",
            "dependencies": { "example.com/org/dep": [[">=1.0.0", "<2.0.0"]] },
            "information": { "name": "legacy" }
        });
        assert!(check_v1_document(&document).is_ok());
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(check_document(&json!([1, 2, 3])).is_err());
    }
}
