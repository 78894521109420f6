//! Reference collapse simulator.
//!
//! A deterministic stand-in for a rigid-body engine, good enough to drive
//! the search end-to-end from the command line. Members that keep a path to
//! the ground through intact joints stay put. Everything else drops under
//! gravity, drifting away from the origin in proportion to the fall height,
//! and comes to rest at its `rest_height`.

use std::collections::VecDeque;
use std::time::Instant;

use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::schema::{Anchor, ConfigError, DebrisExtents, JointId, StructureModel};

use super::{SimulationError, Simulator};

/// Physics parameters of the reference simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Simulated seconds per real second of animation.
    pub time_scale: f32,
    /// Integration substeps per frame.
    pub substeps_per_frame: u32,
    /// Last frame that can be simulated.
    pub frame_end: u32,
    /// Animation frame rate.
    pub fps: f32,
    /// Gravitational acceleration (m/s^2).
    pub gravity: f32,
    /// Outward drift as a fraction of impact speed.
    pub scatter: f32,
    /// Seed for per-member drift jitter.
    pub seed: u64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            time_scale: 3.0,
            substeps_per_frame: 30,
            frame_end: 100,
            fps: 24.0,
            gravity: 9.81,
            scatter: 0.35,
            seed: 0,
        }
    }
}

impl PhysicsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_scale > 0.0 && self.time_scale.is_finite()) {
            return Err(ConfigError::InvalidPhysics("time_scale must be positive".into()));
        }
        if self.substeps_per_frame == 0 {
            return Err(ConfigError::InvalidPhysics(
                "substeps_per_frame must be non-zero".into(),
            ));
        }
        if !(self.fps > 0.0 && self.fps.is_finite()) {
            return Err(ConfigError::InvalidPhysics("fps must be positive".into()));
        }
        if !(self.scatter >= 0.0 && self.scatter.is_finite()) {
            return Err(ConfigError::InvalidPhysics("scatter must be non-negative".into()));
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidPhysics("gravity must be finite".into()));
        }
        Ok(())
    }

    /// Simulated time per substep.
    #[inline]
    fn substep_dt(&self) -> f32 {
        self.time_scale / (self.fps * self.substeps_per_frame as f32)
    }
}

#[derive(Debug, Clone, Copy)]
struct Body {
    position: [f32; 3],
    velocity: [f32; 3],
    falling: bool,
}

/// Deterministic collapse simulator over a [`StructureModel`].
pub struct CollapseSimulator {
    model: StructureModel,
    settings: PhysicsSettings,
    intact: Vec<bool>,
    bodies: Vec<Body>,
    frame: u32,
    /// Support must be recomputed before the next step.
    dirty: bool,
    deadline: Option<Instant>,
}

impl CollapseSimulator {
    pub fn new(model: StructureModel, settings: PhysicsSettings) -> Result<Self, ConfigError> {
        model.validate()?;
        settings.validate()?;
        let mut sim = Self {
            intact: vec![true; model.joints.len()],
            bodies: Vec::with_capacity(model.members.len()),
            model,
            settings,
            frame: 0,
            dirty: true,
            deadline: None,
        };
        sim.rewind();
        Ok(sim)
    }

    /// Current frame.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Members currently detached from the ground.
    pub fn falling_members(&self) -> Vec<usize> {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.falling)
            .map(|(i, _)| i)
            .collect()
    }

    /// Put every member back at its initial position.
    fn rewind(&mut self) {
        self.bodies = self
            .model
            .members
            .iter()
            .map(|m| Body {
                position: m.position,
                velocity: [0.0; 3],
                falling: false,
            })
            .collect();
        self.frame = 0;
        self.dirty = true;
    }

    fn check(&self, joints: &[JointId]) -> Result<(), SimulationError> {
        match joints.iter().find(|&&id| id >= self.intact.len()) {
            Some(&id) => Err(SimulationError::UnknownJoint(id)),
            None => Ok(()),
        }
    }

    /// Members with a path to the ground over intact joints.
    fn supported(&self) -> Vec<bool> {
        let n = self.model.members.len();
        let mut adjacency = vec![Vec::new(); n];
        let mut supported = vec![false; n];
        let mut queue = VecDeque::new();

        for c in &self.model.connections {
            if !self.intact[c.joint] {
                continue;
            }
            match c.anchor {
                Anchor::Ground => {
                    if !supported[c.member] {
                        supported[c.member] = true;
                        queue.push_back(c.member);
                    }
                }
                Anchor::Member(other) => {
                    adjacency[c.member].push(other);
                    adjacency[other].push(c.member);
                }
            }
        }

        while let Some(m) = queue.pop_front() {
            for &next in &adjacency[m] {
                if !supported[next] {
                    supported[next] = true;
                    queue.push_back(next);
                }
            }
        }
        supported
    }

    /// Release newly unsupported members with an outward drift.
    fn release_unsupported(&mut self) -> Result<(), SimulationError> {
        let supported = self.supported();
        let g = self.settings.gravity.max(0.0);
        let jitter = Normal::new(0.0f32, self.settings.scatter * 0.25)
            .map_err(|e| SimulationError::Failed(e.to_string()))?;

        for (i, body) in self.bodies.iter_mut().enumerate() {
            if supported[i] || body.falling {
                continue;
            }
            body.falling = true;

            let rest = self.model.members[i].rest_height;
            let drop = (body.position[2] - rest).max(0.0);
            let impact_speed = (2.0 * g * drop).sqrt();

            let [x, y, _] = body.position;
            let r = (x * x + y * y).sqrt();
            let (dx, dy) = if r > 1e-6 { (x / r, y / r) } else { (0.0, 0.0) };

            // Seeded per member so the drift does not depend on release order.
            let mut rng = StdRng::seed_from_u64(
                self.settings.seed ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            );
            let speed = self.settings.scatter * impact_speed;
            body.velocity = [
                dx * speed + rng.sample(jitter) * impact_speed,
                dy * speed + rng.sample(jitter) * impact_speed,
                0.0,
            ];
        }
        Ok(())
    }

    fn step_frame(&mut self) {
        let dt = self.settings.substep_dt();
        let g = self.settings.gravity;

        for _ in 0..self.settings.substeps_per_frame {
            for (body, member) in self.bodies.iter_mut().zip(&self.model.members) {
                let at_rest =
                    body.velocity == [0.0; 3] && body.position[2] <= member.rest_height;
                if !body.falling || at_rest {
                    continue;
                }
                body.velocity[2] -= g * dt;
                for k in 0..3 {
                    body.position[k] += body.velocity[k] * dt;
                }
                if body.position[2] <= member.rest_height {
                    body.position[2] = member.rest_height;
                    body.velocity = [0.0; 3];
                }
            }
        }
        self.frame += 1;
    }
}

impl Simulator for CollapseSimulator {
    fn reset(&mut self) -> Result<(), SimulationError> {
        self.intact.fill(true);
        self.rewind();
        Ok(())
    }

    fn remove(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        self.check(joints)?;
        for &id in joints {
            self.intact[id] = false;
        }
        self.dirty = true;
        Ok(())
    }

    fn restore(&mut self, joints: &[JointId]) -> Result<(), SimulationError> {
        self.check(joints)?;
        for &id in joints {
            self.intact[id] = true;
        }
        if self.intact.iter().all(|&ok| ok) {
            self.rewind();
        } else {
            self.dirty = true;
        }
        Ok(())
    }

    fn run_to(&mut self, frame: u32) -> Result<(), SimulationError> {
        if frame > self.settings.frame_end {
            return Err(SimulationError::Failed(format!(
                "frame {frame} is past the last frame {}",
                self.settings.frame_end
            )));
        }
        if frame < self.frame {
            self.rewind();
        }

        let start = Instant::now();
        while self.frame < frame {
            if let Some(deadline) = self.deadline
                && Instant::now() >= deadline
            {
                return Err(SimulationError::Timeout {
                    frame,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            if self.dirty {
                self.release_unsupported()?;
                self.dirty = false;
            }
            self.step_frame();
        }
        log::trace!(
            "collapse simulator reached frame {} with {} falling members",
            self.frame,
            self.bodies.iter().filter(|b| b.falling).count()
        );
        Ok(())
    }

    fn measure(&mut self) -> Result<DebrisExtents, SimulationError> {
        let mut extents = DebrisExtents::default();
        for body in &self.bodies {
            let [x, y, z] = body.position;
            extents.max_height = extents.max_height.max(z);
            extents.max_radius = extents.max_radius.max((x * x + y * y).sqrt());
        }
        if !(extents.max_radius.is_finite() && extents.max_height.is_finite()) {
            return Err(SimulationError::InvalidMeasurement {
                max_radius: extents.max_radius,
                max_height: extents.max_height,
            });
        }
        Ok(extents)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }
}
