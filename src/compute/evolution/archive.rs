//! Hall of fame of distinct demolition plans.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::schema::{CandidateSnapshot, FitnessConfig, JointId};

/// Archive keeping the best distinct plans seen by a search.
///
/// Plans are distinct when their flattened joint sets differ; gene order
/// and cluster seeds do not matter.
#[derive(Debug, Default)]
pub struct PlanArchive {
    plans: HashMap<Vec<JointId>, ArchivedPlan>,
    max_size: usize,
}

/// An archived plan with its tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPlan {
    pub snapshot: CandidateSnapshot,
    pub tags: Vec<String>,
}

impl ArchivedPlan {
    /// Sorted joint set identifying the plan.
    pub fn key(&self) -> Vec<JointId> {
        plan_key(&self.snapshot.joints)
    }
}

fn plan_key(joints: &[JointId]) -> Vec<JointId> {
    let mut key = joints.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}

impl PlanArchive {
    pub fn new(max_size: usize) -> Self {
        Self {
            plans: HashMap::new(),
            max_size,
        }
    }

    /// Insert a plan. Returns false when it was not kept.
    ///
    /// A plan already present is replaced only by a higher score. When full,
    /// the lowest-scoring plan is evicted if the new one beats it.
    pub fn add(&mut self, snapshot: CandidateSnapshot, tags: Vec<String>) -> bool {
        if self.max_size == 0 {
            return false;
        }
        let key = plan_key(&snapshot.joints);

        if let Some(existing) = self.plans.get(&key) {
            if snapshot.fitness <= existing.snapshot.fitness {
                return false;
            }
        } else if self.plans.len() >= self.max_size {
            let Some((worst_key, worst)) = self
                .plans
                .iter()
                .min_by(|a, b| a.1.snapshot.fitness.total_cmp(&b.1.snapshot.fitness))
            else {
                return false;
            };
            if snapshot.fitness <= worst.snapshot.fitness {
                return false;
            }
            let worst_key = worst_key.clone();
            self.plans.remove(&worst_key);
        }

        self.plans.insert(key, ArchivedPlan { snapshot, tags });
        true
    }

    /// Look a plan up by its joints, in any order.
    pub fn get(&self, joints: &[JointId]) -> Option<&ArchivedPlan> {
        self.plans.get(&plan_key(joints))
    }

    pub fn all(&self) -> impl Iterator<Item = &ArchivedPlan> {
        self.plans.values()
    }

    pub fn by_tag(&self, tag: &str) -> impl Iterator<Item = &ArchivedPlan> {
        self.plans
            .values()
            .filter(move |p| p.tags.iter().any(|t| t == tag))
    }

    /// Top `n` plans, best first. Ties order by joint set.
    pub fn top_n(&self, n: usize) -> Vec<&ArchivedPlan> {
        let mut plans: Vec<_> = self.plans.iter().collect();
        plans.sort_by(|a, b| {
            b.1.snapshot
                .fitness
                .total_cmp(&a.1.snapshot.fitness)
                .then_with(|| a.0.cmp(b.0))
        });
        plans.into_iter().take(n).map(|(_, p)| p).collect()
    }

    /// Snapshots of every plan, best first.
    pub fn snapshots(&self) -> Vec<CandidateSnapshot> {
        self.top_n(self.plans.len())
            .into_iter()
            .map(|p| p.snapshot.clone())
            .collect()
    }

    /// Write every plan as a JSON file into `dir`, creating it if needed.
    ///
    /// Plan files from an earlier save are removed first; other files stay.
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if is_plan_file(&path) {
                fs::remove_file(&path)?;
            }
        }

        let mut paths = Vec::with_capacity(self.plans.len());
        for (rank, plan) in self.top_n(self.plans.len()).into_iter().enumerate() {
            let path = dir.join(format!(
                "plan_{rank:03}_gen{}_fit{:.3}.json",
                plan.snapshot.generation, plan.snapshot.fitness
            ));
            let json = serde_json::to_string_pretty(plan)?;
            fs::write(&path, json)?;
            paths.push(path);
        }
        log::info!("saved {} plans to {}", paths.len(), dir.display());
        Ok(paths)
    }

    /// Load every plan file in `dir`. Unreadable files are skipped.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P, max_size: usize) -> io::Result<Self> {
        let mut archive = Self::new(max_size);
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match load_plan(&path) {
                Ok(plan) => {
                    archive.add(plan.snapshot, plan.tags);
                }
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
        Ok(archive)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn clear(&mut self) {
        self.plans.clear();
    }
}

fn is_plan_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("plan_") && n.ends_with(".json"))
}

fn load_plan(path: &Path) -> io::Result<ArchivedPlan> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Tag a plan by how its collapse measured against the score ceilings.
///
/// - `contained`: debris within a tenth of `hard_max_radius`
/// - `flattened`: nothing standing above a twentieth of `hard_max_height`
/// - `economical`: at most a tenth of `hard_max_removed` joints removed
pub fn auto_tag(snapshot: &CandidateSnapshot, config: &FitnessConfig) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(extents) = &snapshot.extents {
        if extents.max_radius <= 0.1 * config.hard_max_radius {
            tags.push("contained".to_string());
        }
        if extents.max_height <= 0.05 * config.hard_max_height {
            tags.push("flattened".to_string());
        }
    }
    if snapshot.joints.len() as f32 <= 0.1 * config.hard_max_removed {
        tags.push("economical".to_string());
    }
    tags
}
