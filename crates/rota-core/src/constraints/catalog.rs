//! Registry of named constraints with enable/disable toggles.

use std::collections::HashSet;

use crate::constraints::soft::{
    CoverageTarget, ShiftPreferenceRule, TeamContinuity, WorkloadEquity,
};
use crate::constraints::tier1::{
    AbsenceBlocking, DutyPeriodLimit, NightFloatLimit, OneInSeven, Qualification,
    SupervisionRatio, WorkHour80,
};
use crate::constraints::tier2::CoverageMin;
use crate::constraints::Constraint;
use crate::domain::{CoreError, Tier};

struct CatalogEntry {
    constraint: Box<dyn Constraint>,
    enabled: bool,
    registered_at: usize,
}

/// Catalog of constraints, evaluated in deterministic order: tier, then
/// name, then registration order.
#[derive(Default)]
pub struct ConstraintCatalog {
    entries: Vec<CatalogEntry>,
}

impl ConstraintCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-loaded with the built-in rule set.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        let builtins: Vec<Box<dyn Constraint>> = vec![
            Box::new(WorkHour80),
            Box::new(OneInSeven),
            Box::new(SupervisionRatio),
            Box::new(DutyPeriodLimit),
            Box::new(NightFloatLimit),
            Box::new(AbsenceBlocking),
            Box::new(Qualification),
            Box::new(CoverageMin),
            Box::new(CoverageTarget::default()),
            Box::new(WorkloadEquity::default()),
            Box::new(ShiftPreferenceRule::default()),
            Box::new(TeamContinuity::default()),
        ];
        for constraint in builtins {
            catalog
                .register(constraint)
                .expect("built-in names are unique");
        }
        catalog
    }

    /// Add a constraint under its unique name.
    pub fn register(&mut self, constraint: Box<dyn Constraint>) -> Result<(), CoreError> {
        if self
            .entries
            .iter()
            .any(|e| e.constraint.name() == constraint.name())
        {
            return Err(CoreError::Config(format!(
                "constraint '{}' is already registered",
                constraint.name()
            )));
        }
        let registered_at = self.entries.len();
        self.entries.push(CatalogEntry {
            constraint,
            enabled: true,
            registered_at,
        });
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<(), CoreError> {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> Result<(), CoreError> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), CoreError> {
        match self
            .entries
            .iter_mut()
            .find(|e| e.constraint.name() == name)
        {
            Some(entry) => {
                entry.enabled = enabled;
                Ok(())
            }
            None => Err(CoreError::Config(format!("unknown constraint '{}'", name))),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.constraint.name() == name && e.enabled)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.constraint.name()).collect()
    }

    /// Enabled constraints in evaluation order, optionally filtered by tier.
    pub fn enabled_ordered(&self, tiers: Option<&[Tier]>) -> Vec<&dyn Constraint> {
        let tier_filter: Option<HashSet<Tier>> =
            tiers.map(|ts| ts.iter().copied().collect());

        let mut selected: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| e.enabled)
            .filter(|e| {
                tier_filter
                    .as_ref()
                    .map(|f| f.contains(&e.constraint.tier()))
                    .unwrap_or(true)
            })
            .collect();

        selected.sort_by(|a, b| {
            (a.constraint.tier(), a.constraint.name(), a.registered_at).cmp(&(
                b.constraint.tier(),
                b.constraint.name(),
                b.registered_at,
            ))
        });
        selected.iter().map(|e| e.constraint.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assignment, SchedulingContext, Violation};

    struct Named {
        name: &'static str,
        tier: Tier,
    }

    impl Constraint for Named {
        fn name(&self) -> &str {
            self.name
        }
        fn tier(&self) -> Tier {
            self.tier
        }
        fn violates(&self, _: &[Assignment], _: &SchedulingContext) -> Vec<Violation> {
            Vec::new()
        }
    }

    fn named(name: &'static str, tier: Tier) -> Box<dyn Constraint> {
        Box::new(Named { name, tier })
    }

    #[test]
    fn test_with_defaults_registers_twelve_builtins() {
        let catalog = ConstraintCatalog::with_defaults();
        assert_eq!(catalog.names().len(), 12);
        assert!(catalog.is_enabled("WorkHour80"));
        assert!(catalog.is_enabled("TeamContinuity"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut catalog = ConstraintCatalog::new();
        catalog.register(named("A", Tier::Regulatory)).unwrap();
        let result = catalog.register(named("A", Tier::Preference));
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_disable_removes_from_evaluation_order() {
        let mut catalog = ConstraintCatalog::with_defaults();
        catalog.disable("WorkHour80").unwrap();
        assert!(!catalog.is_enabled("WorkHour80"));
        assert!(catalog
            .enabled_ordered(None)
            .iter()
            .all(|c| c.name() != "WorkHour80"));

        catalog.enable("WorkHour80").unwrap();
        assert!(catalog.is_enabled("WorkHour80"));
    }

    #[test]
    fn test_toggle_unknown_name_fails() {
        let mut catalog = ConstraintCatalog::new();
        assert!(matches!(
            catalog.disable("Nope"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_evaluation_order_is_tier_then_name() {
        let mut catalog = ConstraintCatalog::new();
        catalog.register(named("Zeta", Tier::Regulatory)).unwrap();
        catalog.register(named("Beta", Tier::Preference)).unwrap();
        catalog.register(named("Alpha", Tier::Regulatory)).unwrap();

        let order: Vec<&str> = catalog
            .enabled_ordered(None)
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(order, vec!["Alpha", "Zeta", "Beta"]);
    }

    #[test]
    fn test_tier_filter() {
        let catalog = ConstraintCatalog::with_defaults();
        let tier1 = catalog.enabled_ordered(Some(&[Tier::Regulatory]));
        assert_eq!(tier1.len(), 7);
        assert!(tier1.iter().all(|c| c.tier() == Tier::Regulatory));
    }
}
