//! Controller strategy selection
//!
//! Traits able to decide what kind of controller runs the integration are
//! consulted by ascending selector priority. The first decision wins; without
//! any, the integration runs as a plain deployment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Environment;

/// Shape of the workload running the integration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControllerStrategy {
    /// Always-on deployment
    #[default]
    Deployment,
    /// Scale-to-zero service
    KnativeService,
    /// Scheduled job
    CronJob,
}

impl ControllerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerStrategy::Deployment => "deployment",
            ControllerStrategy::KnativeService => "knative-service",
            ControllerStrategy::CronJob => "cron-job",
        }
    }
}

impl fmt::Display for ControllerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(ControllerStrategy::Deployment),
            "knative-service" => Ok(ControllerStrategy::KnativeService),
            "cron-job" => Ok(ControllerStrategy::CronJob),
            other => Err(format!(
                "unsupported controller strategy {:?}, expected one of deployment, knative-service, cron-job",
                other
            )),
        }
    }
}

/// Capability of a trait to pick the controller strategy
pub trait ControllerStrategySelector: Send + Sync {
    /// `None` when the trait has no opinion. Must only depend on the
    /// resolved configuration and the input documents.
    fn select_controller_strategy(&self, env: &Environment) -> Option<ControllerStrategy>;

    /// Lower values are consulted first
    fn selector_priority(&self) -> i32;
}

/// Walk the selectors in order and return the first decision
pub fn choose<'a, I>(selectors: I, env: &Environment) -> ControllerStrategy
where
    I: IntoIterator<Item = &'a dyn ControllerStrategySelector>,
{
    selectors
        .into_iter()
        .find_map(|s| s.select_controller_strategy(env))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationDocument, IntegrationSpec};
    use crate::traits::Catalog;
    use std::sync::Arc;

    struct Fixed(Option<ControllerStrategy>, i32);

    impl ControllerStrategySelector for Fixed {
        fn select_controller_strategy(&self, _env: &Environment) -> Option<ControllerStrategy> {
            self.0
        }

        fn selector_priority(&self) -> i32 {
            self.1
        }
    }

    fn env() -> Environment {
        let catalog = Arc::new(Catalog::new(Vec::new()));
        Environment::new(catalog, IntegrationDocument::new(IntegrationSpec::new("x")))
    }

    #[test]
    fn test_first_decision_wins() {
        let none = Fixed(None, 0);
        let cron = Fixed(Some(ControllerStrategy::CronJob), 1);
        let deployment = Fixed(Some(ControllerStrategy::Deployment), 2);
        let selectors: Vec<&dyn ControllerStrategySelector> = vec![&none, &cron, &deployment];
        assert_eq!(choose(selectors, &env()), ControllerStrategy::CronJob);
    }

    #[test]
    fn test_default_without_decision() {
        let none = Fixed(None, 0);
        let selectors: Vec<&dyn ControllerStrategySelector> = vec![&none];
        assert_eq!(choose(selectors, &env()), ControllerStrategy::Deployment);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "knative-service".parse::<ControllerStrategy>().unwrap(),
            ControllerStrategy::KnativeService
        );
        assert!("statefulset".parse::<ControllerStrategy>().is_err());
        assert_eq!(ControllerStrategy::CronJob.to_string(), "cron-job");
    }
}
