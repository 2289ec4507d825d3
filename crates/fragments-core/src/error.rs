//! Error types for fragments

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Main error type for fragments
#[derive(Error, Debug)]
pub enum FragmentsError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No packing strategy is registered under the requested name
    #[error("Unknown packer: {0}")]
    UnknownStrategy(String),

    /// Flavor id missing from the flavor table
    #[error("Unknown flavor: {0}")]
    UnknownFlavor(String),

    /// One or more fragments require fragments that were never declared
    #[error("Missing dependencies: {0}")]
    MissingDependencies(MissingDependencies),

    /// Required fragments form a cycle
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Two fragments were declared with the same name
    #[error("Duplicate fragment name: {0}")]
    DuplicateFragmentName(String),

    /// Fragment record is malformed or cannot be applied
    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    /// Placing a fragment would overflow a machine
    #[error("Capacity exceeded on machine {ordinal}: {required} MB required, {capacity} MB capacity")]
    CapacityExceeded {
        ordinal: u32,
        required: u64,
        capacity: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for fragments operations
pub type FragmentsResult<T> = Result<T, FragmentsError>;

impl From<serde_json::Error> for FragmentsError {
    fn from(err: serde_json::Error) -> Self {
        FragmentsError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FragmentsError {
    fn from(err: toml::de::Error) -> Self {
        FragmentsError::Config(err.to_string())
    }
}

/// Validation failure report: fragment name to the dependency names it lacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingDependencies(pub BTreeMap<String, Vec<String>>);

impl MissingDependencies {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Missing names for a single fragment, if any
    pub fn get(&self, fragment: &str) -> Option<&[String]> {
        self.0.get(fragment).map(Vec::as_slice)
    }
}

impl fmt::Display for MissingDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .0
            .iter()
            .map(|(fragment, missing)| format!("{} requires [{}]", fragment, missing.join(", ")))
            .collect();
        write!(f, "{}", entries.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_display() {
        let err = FragmentsError::CapacityExceeded {
            ordinal: 2,
            required: 4096,
            capacity: 2048,
        };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded on machine 2: 4096 MB required, 2048 MB capacity"
        );
    }

    #[test]
    fn test_lookup_errors_name_the_key() {
        assert_eq!(
            FragmentsError::UnknownFlavor("42".to_string()).to_string(),
            "Unknown flavor: 42"
        );
        assert_eq!(
            FragmentsError::UnknownStrategy("optimal".to_string()).to_string(),
            "Unknown packer: optimal"
        );
    }

    #[test]
    fn test_parse_errors_are_classified() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            FragmentsError::from(json_err),
            FragmentsError::Serialization(_)
        ));

        let toml_err = toml::from_str::<toml::Value>("a = ").unwrap_err();
        assert!(matches!(FragmentsError::from(toml_err), FragmentsError::Config(_)));
    }

    #[test]
    fn test_missing_dependencies_display() {
        let mut missing = BTreeMap::new();
        missing.insert("X".to_string(), vec!["Y".to_string(), "Z".to_string()]);
        let err = FragmentsError::MissingDependencies(MissingDependencies(missing));
        assert_eq!(err.to_string(), "Missing dependencies: X requires [Y, Z]");
    }

    #[test]
    fn test_cycle_display() {
        let err = FragmentsError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
    }
}
