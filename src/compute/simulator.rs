//! Simulator collaborator contract.
//!
//! The search never computes physics itself. It drives an external engine
//! through [`Simulator`]: reset to the canonical state, remove joints, run to
//! a sample frame, measure the debris, restore. Implementations hold shared
//! mutable state, so a single instance must never run two evaluations at once.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::schema::{DebrisExtents, JointId};

/// Errors reported by a simulator. All of them count as a simulation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("Simulation failed: {0}")]
    Failed(String),
    #[error("Simulation timed out before frame {frame} after {elapsed_ms} ms")]
    Timeout { frame: u32, elapsed_ms: u64 },
    #[error("Unknown joint {0}")]
    UnknownJoint(JointId),
    #[error("Measurement is not finite: radius={max_radius}, height={max_height}")]
    InvalidMeasurement { max_radius: f32, max_height: f32 },
}

/// External physics engine driven by the fitness evaluator.
pub trait Simulator {
    /// Restore the canonical initial configuration, all joints intact.
    fn reset(&mut self) -> Result<(), SimulationError>;

    /// Detach the named joints without touching any other joint.
    fn remove(&mut self, joints: &[JointId]) -> Result<(), SimulationError>;

    /// Reattach previously removed joints.
    fn restore(&mut self, joints: &[JointId]) -> Result<(), SimulationError>;

    /// Advance deterministically to `frame` and block until done.
    fn run_to(&mut self, frame: u32) -> Result<(), SimulationError>;

    /// Read debris extents from the current state.
    fn measure(&mut self) -> Result<DebrisExtents, SimulationError>;

    /// Wall-clock deadline for the next `run_to`. Cooperative simulators
    /// return [`SimulationError::Timeout`] once it passes.
    fn set_deadline(&mut self, _deadline: Option<Instant>) {}
}

impl<S: Simulator + ?Sized> Simulator for Box<S> {
    fn reset(&mut self) -> Result<(), SimulationError> {
        (**self).reset()
    }
    fn remove(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        (**self).remove(joints)
    }
    fn restore(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        (**self).restore(joints)
    }
    fn run_to(&mut self, frame: u32) -> Result<(), SimulationError> {
        (**self).run_to(frame)
    }
    fn measure(&mut self) -> Result<DebrisExtents, SimulationError> {
        (**self).measure()
    }
    fn set_deadline(&mut self, deadline: Option<Instant>) {
        (**self).set_deadline(deadline)
    }
}

/// Call counters kept by [`ScriptedSimulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallLog {
    pub resets: usize,
    pub removes: usize,
    pub restores: usize,
    pub runs: usize,
    pub measures: usize,
}

/// Deterministic fake whose measurement is a function of the removed joints.
///
/// Tracks which joints are detached, so tests can assert that every
/// evaluation leaves it back in the canonical state.
pub struct ScriptedSimulator<F> {
    joint_count: usize,
    script: F,
    removed: BTreeSet<JointId>,
    fail_when: Option<Box<dyn Fn(&BTreeSet<JointId>) -> bool + Send>>,
    calls: CallLog,
}

impl<F> ScriptedSimulator<F>
where
    F: FnMut(&BTreeSet<JointId>) -> DebrisExtents,
{
    pub fn new(joint_count: usize, script: F) -> Self {
        Self {
            joint_count,
            script,
            removed: BTreeSet::new(),
            fail_when: None,
            calls: CallLog::default(),
        }
    }

    /// Make `run_to` fail whenever `predicate` holds for the removed set.
    pub fn failing_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&BTreeSet<JointId>) -> bool + Send + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Joints currently detached.
    pub fn removed(&self) -> &BTreeSet<JointId> {
        &self.removed
    }

    pub fn calls(&self) -> CallLog {
        self.calls
    }

    fn check(&self, joints: &[JointId]) -> Result<(), SimulationError> {
        match joints.iter().find(|&&id| id >= self.joint_count) {
            Some(&id) => Err(SimulationError::UnknownJoint(id)),
            None => Ok(()),
        }
    }
}

impl ScriptedSimulator<fn(&BTreeSet<JointId>) -> DebrisExtents> {
    /// A fake that always reports the same extents.
    pub fn constant(
        joint_count: usize,
        extents: DebrisExtents,
    ) -> ScriptedSimulator<impl FnMut(&BTreeSet<JointId>) -> DebrisExtents> {
        ScriptedSimulator::new(joint_count, move |_: &BTreeSet<JointId>| extents)
    }
}

impl<F> Simulator for ScriptedSimulator<F>
where
    F: FnMut(&BTreeSet<JointId>) -> DebrisExtents,
{
    fn reset(&mut self) -> Result<(), SimulationError> {
        self.calls.resets += 1;
        self.removed.clear();
        Ok(())
    }

    fn remove(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        self.calls.removes += 1;
        self.check(joints)?;
        self.removed.extend(joints.iter().copied());
        Ok(())
    }

    fn restore(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        self.calls.restores += 1;
        self.check(joints)?;
        for id in joints {
            self.removed.remove(id);
        }
        Ok(())
    }

    fn run_to(&mut self, frame: u32) -> Result<(), SimulationError> {
        self.calls.runs += 1;
        if let Some(fail) = &self.fail_when
            && fail(&self.removed)
        {
            return Err(SimulationError::Failed(format!(
                "scripted failure before frame {frame}"
            )));
        }
        Ok(())
    }

    fn measure(&mut self) -> Result<DebrisExtents, SimulationError> {
        self.calls.measures += 1;
        Ok((self.script)(&self.removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_tracks_removed() {
        let mut sim = ScriptedSimulator::new(4, |removed: &BTreeSet<JointId>| DebrisExtents {
            max_radius: removed.len() as f32,
            max_height: 0.0,
        });
        sim.reset().unwrap();
        sim.remove(&[1, 3]).unwrap();
        sim.run_to(10).unwrap();
        assert_eq!(sim.measure().unwrap().max_radius, 2.0);
        sim.restore(&[1, 3]).unwrap();
        assert!(sim.removed().is_empty());
        assert_eq!(sim.calls().measures, 1);
    }

    #[test]
    fn test_scripted_rejects_unknown_joint() {
        let mut sim = ScriptedSimulator::constant(2, DebrisExtents::default());
        assert_eq!(sim.remove(&[5]), Err(SimulationError::UnknownJoint(5)));
    }

    #[test]
    fn test_scripted_failure_injection() {
        let mut sim = ScriptedSimulator::constant(3, DebrisExtents::default())
            .failing_when(|removed| removed.contains(&2));
        sim.remove(&[0]).unwrap();
        assert!(sim.run_to(1).is_ok());
        sim.remove(&[2]).unwrap();
        assert!(matches!(sim.run_to(1), Err(SimulationError::Failed(_))));
    }

    #[test]
    fn test_boxed_simulator() {
        let mut sim: Box<dyn Simulator> =
            Box::new(ScriptedSimulator::constant(2, DebrisExtents::default()));
        sim.reset().unwrap();
        sim.set_deadline(None);
        assert_eq!(sim.measure().unwrap(), DebrisExtents::default());
    }
}
