//! Statistical process control over schedule metrics: Shewhart zones,
//! CUSUM and EWMA for small shifts, Western Electric rules for pattern
//! detection.

pub mod cusum;
pub mod ewma;
pub mod shewhart;
pub mod western_electric;

pub use cusum::{Cusum, CusumPoint, CusumSignal};
pub use ewma::{Ewma, EwmaPoint};
pub use shewhart::{Capability, ControlChart, ControlChartPoint, Zone};
pub use western_electric::{
    summarize, RuleSeverity, RuleViolation, SpcStatus, WesternElectricRules,
};
