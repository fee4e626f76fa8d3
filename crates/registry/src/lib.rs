use crate::error::RegistryError;
use std::collections::HashMap;

pub mod definition;
pub mod error;

// Re-export the core types to provide a clean public API.
pub use definition::{AggregationRule, MetricDefinition, MissingPolicy, StatisticalType};

/// The metric definition registry.
///
/// Holds validated metric definitions keyed by their unique name while
/// preserving definition order, which downstream computation relies on for
/// deterministic output.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    by_name: HashMap<String, usize>,
}

impl MetricRegistry {
    /// Builds a registry from a list of definitions, rejecting duplicates
    /// and incompatible aggregation/type pairings.
    pub fn from_definitions(
        definitions: Vec<MetricDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (idx, def) in definitions.iter().enumerate() {
            def.validate()?;
            if by_name.insert(def.name.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateMetric(def.name.clone()));
            }
        }
        Ok(Self { definitions, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.by_name.get(name).map(|&idx| &self.definitions[idx])
    }

    /// Resolves a list of metric names, in definition order, failing on the
    /// first unknown name.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<&MetricDefinition>, RegistryError> {
        let mut requested: Vec<&MetricDefinition> = Vec::with_capacity(names.len());
        for name in names {
            let def = self
                .get(name)
                .ok_or_else(|| RegistryError::UnknownMetric(name.clone()))?;
            requested.push(def);
        }
        // Definition order, not request order, so that output is stable no
        // matter how the experiment lists its metrics.
        requested.sort_by_key(|def| self.by_name[&def.name]);
        requested.dedup_by_key(|def| def.name.clone());
        Ok(requested)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            aggregation: AggregationRule::AnyEvent,
            statistical_type: StatisticalType::Binary,
            min_sample_size: None,
            missing: None,
        }
    }

    #[test]
    fn lookup_by_name() {
        let registry = MetricRegistry::from_definitions(vec![def("a"), def("b")]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().name, "a");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = MetricRegistry::from_definitions(vec![def("a"), def("a")]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMetric(name) if name == "a"));
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let mut bad = def("bad");
        bad.statistical_type = StatisticalType::Continuous;
        assert!(MetricRegistry::from_definitions(vec![bad]).is_err());
    }

    #[test]
    fn resolve_returns_definition_order() {
        let registry =
            MetricRegistry::from_definitions(vec![def("a"), def("b"), def("c")]).unwrap();
        let resolved = registry
            .resolve(&["c".to_string(), "a".to_string()])
            .unwrap();
        let names: Vec<&str> = resolved.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn resolve_fails_on_unknown_metric() {
        let registry = MetricRegistry::from_definitions(vec![def("a")]).unwrap();
        let err = registry.resolve(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownMetric(name) if name == "nope"));
    }
}
