use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::{CheckAlgorithm, CheckFinding, algorithms};
use crate::analysis::PageAnalysis;
use crate::site::SiteConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmFailure {
    pub id: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckRun {
    pub findings: Vec<CheckFinding>,
    pub failures: Vec<AlgorithmFailure>,
}

impl CheckRun {
    /// Ids of the algorithms that reported at least one finding.
    pub fn detected_ids(&self) -> BTreeSet<u32> {
        self.findings
            .iter()
            .map(|finding| finding.algorithm_id)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FixOutcome {
    pub text: String,
    /// Algorithms whose fix changed the text, in application order.
    pub applied: Vec<u32>,
    pub failures: Vec<AlgorithmFailure>,
}

/// Algorithms keyed by id, run in id order.
#[derive(Default)]
pub struct CheckRegistry {
    algorithms: BTreeMap<u32, Box<dyn CheckAlgorithm>>,
    disabled: BTreeSet<u32>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_algorithms() -> Self {
        let mut registry = Self::new();
        for algorithm in algorithms::default_algorithms() {
            registry.register(algorithm);
        }
        registry
    }

    /// Register `algorithm`, replacing any previous one with the same id.
    pub fn register(&mut self, algorithm: Box<dyn CheckAlgorithm>) {
        self.algorithms.insert(algorithm.id(), algorithm);
    }

    pub fn enable(&mut self, id: u32) {
        self.disabled.remove(&id);
    }

    pub fn disable(&mut self, id: u32) {
        self.disabled.insert(id);
    }

    pub fn is_enabled(&self, id: u32) -> bool {
        self.algorithms.contains_key(&id) && !self.disabled.contains(&id)
    }

    pub fn get(&self, id: u32) -> Option<&dyn CheckAlgorithm> {
        self.algorithms.get(&id).map(|algorithm| algorithm.as_ref())
    }

    /// Every registered algorithm, enabled or not.
    pub fn algorithms(&self) -> impl Iterator<Item = &dyn CheckAlgorithm> {
        self.algorithms.values().map(|algorithm| algorithm.as_ref())
    }

    fn enabled(&self) -> impl Iterator<Item = &dyn CheckAlgorithm> {
        self.algorithms
            .iter()
            .filter(|(id, _)| !self.disabled.contains(id))
            .map(|(_, algorithm)| algorithm.as_ref())
    }

    /// Run one algorithm with failure isolation.
    pub fn run(
        &self,
        id: u32,
        analysis: &PageAnalysis,
        only_automatic: bool,
    ) -> Result<Vec<CheckFinding>, AlgorithmFailure> {
        let Some(algorithm) = self.get(id) else {
            return Err(AlgorithmFailure {
                id,
                message: "algorithm is not registered".to_string(),
            });
        };
        guarded(id, || algorithm.detect(analysis, only_automatic))
    }

    pub fn run_all(&self, analysis: &PageAnalysis, only_automatic: bool) -> CheckRun {
        let mut run = CheckRun::default();
        for algorithm in self.enabled() {
            if only_automatic && !algorithm.can_fix() {
                continue;
            }
            let id = algorithm.id();
            match guarded(id, || algorithm.detect(analysis, only_automatic)) {
                Ok(findings) => run.findings.extend(findings),
                Err(failure) => {
                    warn!("check algorithm {id} failed during detection: {}", failure.message);
                    run.failures.push(failure);
                }
            }
        }
        run
    }

    /// Apply the fix of every enabled algorithm (restricted to `only` when
    /// given) in registry order, re-analyzing after each change.
    pub fn fix_all(&self, text: &str, site: &Arc<SiteConfig>, only: Option<&[u32]>) -> FixOutcome {
        let mut outcome = FixOutcome {
            text: text.to_string(),
            ..FixOutcome::default()
        };
        for algorithm in self.enabled() {
            let id = algorithm.id();
            if !algorithm.can_fix() || only.is_some_and(|ids| !ids.contains(&id)) {
                continue;
            }
            let analysis = PageAnalysis::new(outcome.text.as_str(), Arc::clone(site));
            match guarded(id, || algorithm.fix(&analysis)) {
                Ok(fixed) => {
                    if fixed != outcome.text {
                        outcome.text = fixed;
                        outcome.applied.push(id);
                    }
                }
                Err(failure) => {
                    warn!("check algorithm {id} failed during fix: {}", failure.message);
                    outcome.failures.push(failure);
                }
            }
        }
        outcome
    }
}

fn guarded<T>(
    id: u32,
    body: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, AlgorithmFailure> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(AlgorithmFailure {
            id,
            message: format!("{error:#}"),
        }),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(AlgorithmFailure {
                id,
                message: format!("panicked: {message}"),
            })
        }
    }
}
