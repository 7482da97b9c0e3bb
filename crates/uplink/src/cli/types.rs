//! CLI value enums.

use clap::ValueEnum;

/// Preset that decides whether merge dates are looked up.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleModeArg {
    /// Developer view: merge dates on
    Dev,
    /// Planning and QA view: merge dates off
    #[value(name = "plan_qa", alias = "plan-qa")]
    PlanQa,
}

impl RoleModeArg {
    /// Whether this preset enables merge date enrichment.
    #[must_use]
    pub fn wants_merge_dates(self) -> bool {
        matches!(self, Self::Dev)
    }
}

impl std::fmt::Display for RoleModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::PlanQa => write!(f, "plan_qa"),
        }
    }
}
