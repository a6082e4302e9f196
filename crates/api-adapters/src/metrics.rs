//! Prometheus counters for flag operations, served at `/metrics`.

use std::fmt;

use domains::{DomainError, DomainResult};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Operation {
    Flag,
    Unflag,
    Lookup,
    List,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Ok,
    Invalid,
    Conflict,
    RateLimited,
    Error,
}

impl Outcome {
    pub fn of<T>(result: &DomainResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(DomainError::Conflict(_)) => Self::Conflict,
            Err(DomainError::RateLimited { .. }) => Self::RateLimited,
            Err(DomainError::StoreUnavailable(_)) => Self::Error,
            Err(
                DomainError::Validation(_) | DomainError::InvalidCursor(_) | DomainError::NotFound(_),
            ) => Self::Invalid,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OperationLabels {
    operation: Operation,
    outcome: Outcome,
}

pub struct FlagMetrics {
    registry: Registry,
    operations: Family<OperationLabels, Counter>,
}

impl Default for FlagMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let operations = Family::<OperationLabels, Counter>::default();
        registry.register(
            "tile_flag_operations",
            "Flag API operations by outcome",
            operations.clone(),
        );
        Self {
            registry,
            operations,
        }
    }

    pub fn observe(&self, operation: Operation, outcome: Outcome) {
        self.operations
            .get_or_create(&OperationLabels { operation, outcome })
            .inc();
    }

    /// Zero for a series never observed; reading does not create it.
    pub fn count(&self, operation: Operation, outcome: Outcome) -> u64 {
        self.operations
            .get(&OperationLabels { operation, outcome })
            .map_or(0, |counter| counter.get())
    }

    /// OpenMetrics text exposition.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_operation_and_outcome() {
        let metrics = FlagMetrics::new();
        metrics.observe(Operation::Flag, Outcome::Ok);
        metrics.observe(Operation::Flag, Outcome::Ok);
        metrics.observe(Operation::Flag, Outcome::RateLimited);

        assert_eq!(metrics.count(Operation::Flag, Outcome::Ok), 2);
        assert_eq!(metrics.count(Operation::Flag, Outcome::RateLimited), 1);
        assert_eq!(metrics.count(Operation::Unflag, Outcome::Ok), 0);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"tile_flag_operations_total{operation="Flag",outcome="Ok"} 2"#));
        assert!(!text.contains(r#"operation="Unflag""#));
    }

    #[test]
    fn outcome_follows_error_kind() {
        let conflict: DomainResult<()> = Err(DomainError::Conflict("x".into()));
        let store: DomainResult<()> = Err(DomainError::store("down"));
        assert_eq!(Outcome::of(&conflict), Outcome::Conflict);
        assert_eq!(Outcome::of(&store), Outcome::Error);
        assert_eq!(Outcome::of(&Ok::<_, DomainError>(1)), Outcome::Ok);
    }
}
