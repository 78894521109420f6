//! Fitness evaluation of demolition plans.
//!
//! Each evaluation runs the full simulator protocol: reset, remove the plan's
//! joints, run to the sample frame, measure, and restore. A failed
//! simulation scores 0 instead of aborting the search.

use std::time::{Duration, Instant};

use crate::compute::{SimulationError, Simulator};
use crate::schema::{Chromosome, DebrisExtents, EvaluationConfig, FitnessConfig, JointId};

/// Outcome of evaluating one chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Score in [0, 1]; 0 when the simulation failed.
    pub fitness: f32,
    /// Deduplicated joint ids that were removed.
    pub removed: Vec<JointId>,
    /// Measured extents, absent on failure.
    pub extents: Option<DebrisExtents>,
    /// Failure that forced the worst score.
    pub failure: Option<SimulationError>,
}

impl Evaluation {
    #[inline]
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Evaluates chromosomes against a simulator.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
    eval_config: EvaluationConfig,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(config: FitnessConfig, eval_config: EvaluationConfig) -> Self {
        Self {
            config,
            eval_config,
        }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Evaluate a chromosome. The simulator is left in its canonical state
    /// whether or not the simulation succeeds.
    pub fn evaluate<S: Simulator + ?Sized>(
        &self,
        chromosome: &Chromosome,
        simulator: &mut S,
    ) -> Evaluation {
        let removed = chromosome.flatten();
        let outcome = self.simulate(&removed, simulator);

        if let Err(e) = simulator.restore(&removed) {
            log::warn!("restore after evaluation failed ({e}); resetting simulator");
            if let Err(e) = simulator.reset() {
                log::error!("simulator reset failed: {e}");
            }
        }
        simulator.set_deadline(None);

        match outcome {
            Ok(extents) => Evaluation {
                fitness: demolition_score(&extents, removed.len(), &self.config),
                removed,
                extents: Some(extents),
                failure: None,
            },
            Err(e) => {
                log::warn!(
                    "simulation failed for plan of {} joints: {e}; scoring 0",
                    removed.len()
                );
                Evaluation {
                    fitness: 0.0,
                    removed,
                    extents: None,
                    failure: Some(e),
                }
            }
        }
    }

    fn simulate<S: Simulator + ?Sized>(
        &self,
        removed: &[JointId],
        simulator: &mut S,
    ) -> Result<DebrisExtents, SimulationError> {
        let frame = self.eval_config.sample_frame;
        let timeout = self.eval_config.timeout_ms.map(Duration::from_millis);
        let start = Instant::now();

        simulator.reset()?;
        simulator.remove(removed)?;
        simulator.set_deadline(timeout.map(|t| start + t));
        simulator.run_to(frame)?;

        // Non-cooperative simulators ignore the deadline; catch overruns here.
        let elapsed = start.elapsed();
        if let Some(t) = timeout
            && elapsed > t
        {
            return Err(SimulationError::Timeout {
                frame,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        let extents = simulator.measure()?;
        if !(extents.max_radius.is_finite() && extents.max_height.is_finite()) {
            return Err(SimulationError::InvalidMeasurement {
                max_radius: extents.max_radius,
                max_height: extents.max_height,
            });
        }
        Ok(extents)
    }
}

/// Score a measured collapse.
///
/// `(w_r (1 - r) + w_h (1 - h)^3 + w_d (1 - d)) / (w_r + w_h + w_d)` with each
/// term normalized by its ceiling and clamped to [0, 1]. Tighter, lower, and
/// cheaper collapses score higher; the cube makes residual height dominate.
pub fn demolition_score(extents: &DebrisExtents, removed: usize, config: &FitnessConfig) -> f32 {
    let r_norm = normalize(extents.max_radius, config.hard_max_radius);
    let h_norm = normalize(extents.max_height, config.hard_max_height);
    let d_norm = normalize(removed as f32, config.hard_max_removed);

    let total = config.total_weight();
    if total <= 0.0 {
        return 0.0;
    }
    (config.weight_radius * (1.0 - r_norm)
        + config.weight_height * (1.0 - h_norm).powi(3)
        + config.weight_removed * (1.0 - d_norm))
        / total
}

#[inline]
fn normalize(value: f32, ceiling: f32) -> f32 {
    (value / ceiling).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ScriptedSimulator;
    use crate::schema::Cluster;
    use std::collections::BTreeSet;

    fn extents(max_radius: f32, max_height: f32) -> DebrisExtents {
        DebrisExtents {
            max_radius,
            max_height,
        }
    }

    fn fitness_config(weights: (f32, f32, f32)) -> FitnessConfig {
        FitnessConfig {
            hard_max_radius: 10.0,
            hard_max_height: 20.0,
            hard_max_removed: 4.0,
            weight_radius: weights.0,
            weight_height: weights.1,
            weight_removed: weights.2,
        }
    }

    fn gene(seed: usize, members: &[usize]) -> Cluster {
        Cluster {
            seed,
            members: members.to_vec(),
        }
    }

    #[test]
    fn test_score_bounds_exact() {
        for weights in [(1.0, 1.0, 1.0), (0.3, 2.0, 5.0), (7.0, 0.1, 0.0)] {
            let config = fitness_config(weights);
            let worst = demolition_score(&extents(10.0, 20.0), 4, &config);
            let best = demolition_score(&extents(0.0, 0.0), 0, &config);
            assert_eq!(worst, 0.0);
            assert_eq!(best, 1.0);
        }
    }

    #[test]
    fn test_score_clamps_out_of_range() {
        let config = fitness_config((1.0, 1.0, 1.0));
        assert_eq!(demolition_score(&extents(1e6, 1e6), 100, &config), 0.0);
        assert_eq!(demolition_score(&extents(-5.0, -5.0), 0, &config), 1.0);
    }

    #[test]
    fn test_height_term_is_cubic() {
        let config = fitness_config((0.0, 1.0, 0.0));
        let score = demolition_score(&extents(0.0, 10.0), 0, &config);
        assert!((score - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_removed_count_scenario() {
        // Stub reports nothing standing; only the economy term varies.
        let config = fitness_config((1.0, 2.0, 3.0));
        for k in 0..=4 {
            let expected = (1.0 + 2.0 + 3.0 * (1.0 - k as f32 / 4.0)) / 6.0;
            let score = demolition_score(&extents(0.0, 0.0), k, &config);
            assert!((score - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_evaluate_deduplicates_and_restores() {
        let mut sim = ScriptedSimulator::new(6, |removed: &BTreeSet<usize>| DebrisExtents {
            max_radius: removed.len() as f32,
            max_height: 0.0,
        });
        let evaluator = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig::default(),
        );
        // Overlapping genes, as crossover can produce.
        let chromosome = Chromosome::new(vec![gene(1, &[0, 1, 2]), gene(2, &[1, 2, 3])]);

        let eval = evaluator.evaluate(&chromosome, &mut sim);
        assert_eq!(eval.removed, vec![0, 1, 2, 3]);
        assert_eq!(eval.extents.unwrap().max_radius, 4.0);
        assert!(!eval.failed());
        assert!(sim.removed().is_empty());

        let calls = sim.calls();
        assert_eq!(calls.resets, 1);
        assert_eq!(calls.restores, 1);
    }

    #[test]
    fn test_simulation_failure_scores_zero() {
        let mut sim = ScriptedSimulator::constant(4, DebrisExtents::default())
            .failing_when(|removed| removed.contains(&3));
        let evaluator = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig::default(),
        );
        let eval = evaluator.evaluate(&Chromosome::new(vec![gene(3, &[3])]), &mut sim);
        assert_eq!(eval.fitness, 0.0);
        assert!(matches!(eval.failure, Some(SimulationError::Failed(_))));
        assert!(sim.removed().is_empty());

        let ok = evaluator.evaluate(&Chromosome::new(vec![gene(0, &[0])]), &mut sim);
        assert!(ok.fitness > 0.0);
    }

    #[test]
    fn test_non_finite_measurement_is_failure() {
        let mut sim = ScriptedSimulator::constant(2, extents(f32::NAN, 0.0));
        let evaluator = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig::default(),
        );
        let eval = evaluator.evaluate(&Chromosome::default(), &mut sim);
        assert_eq!(eval.fitness, 0.0);
        assert!(matches!(
            eval.failure,
            Some(SimulationError::InvalidMeasurement { .. })
        ));
    }

    /// Ignores deadlines and takes a while to reach any frame.
    struct SlowSimulator;

    impl Simulator for SlowSimulator {
        fn reset(&mut self) -> Result<(), SimulationError> {
            Ok(())
        }
        fn remove(&mut self, _: &[JointId]) -> Result<(), SimulationError> {
            Ok(())
        }
        fn restore(&mut self, _: &[JointId]) -> Result<(), SimulationError> {
            Ok(())
        }
        fn run_to(&mut self, _: u32) -> Result<(), SimulationError> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        }
        fn measure(&mut self) -> Result<DebrisExtents, SimulationError> {
            Ok(DebrisExtents::default())
        }
    }

    #[test]
    fn test_overrun_is_timeout() {
        let evaluator = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig {
                timeout_ms: Some(1),
                ..Default::default()
            },
        );
        let eval = evaluator.evaluate(&Chromosome::default(), &mut SlowSimulator);
        assert_eq!(eval.fitness, 0.0);
        assert!(matches!(
            eval.failure,
            Some(SimulationError::Timeout { frame: 99, .. })
        ));

        let unbounded = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig {
                timeout_ms: None,
                ..Default::default()
            },
        );
        assert!(!unbounded.evaluate(&Chromosome::default(), &mut SlowSimulator).failed());
    }

    #[test]
    fn test_unknown_joint_is_failure() {
        let mut sim = ScriptedSimulator::constant(2, DebrisExtents::default());
        let evaluator = FitnessEvaluator::new(
            fitness_config((1.0, 1.0, 1.0)),
            EvaluationConfig::default(),
        );
        let eval = evaluator.evaluate(&Chromosome::new(vec![gene(9, &[9])]), &mut sim);
        assert_eq!(eval.failure, Some(SimulationError::UnknownJoint(9)));
        assert_eq!(eval.fitness, 0.0);
    }
}
