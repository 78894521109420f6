//! Structural model types: joints, debris members, and their connections.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Index of a joint in the registry.
pub type JointId = usize;

/// A removable structural connector at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Dense index into the registry.
    pub id: JointId,
    /// World-space position (x, y, z), z up.
    pub position: [f32; 3],
}

impl Joint {
    /// Euclidean distance to another joint.
    #[inline]
    pub fn distance(&self, other: &Joint) -> f32 {
        let dx = self.position[0] - other.position[0];
        let dy = self.position[1] - other.position[1];
        let dz = self.position[2] - other.position[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Read-only registry of every removable joint in a structure.
///
/// Joint ids are the dense sequence `0..len`, so an id doubles as an index.
#[derive(Debug, Clone)]
pub struct JointRegistry {
    joints: Vec<Joint>,
}

impl JointRegistry {
    /// Build a registry, rejecting empty input and non-dense ids.
    pub fn new(joints: Vec<Joint>) -> Result<Self, ConfigError> {
        if joints.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        for (index, joint) in joints.iter().enumerate() {
            if joint.id != index {
                return Err(ConfigError::JointIdMismatch {
                    index,
                    id: joint.id,
                });
            }
        }
        Ok(Self { joints })
    }

    /// Build a registry from bare positions, assigning ids in order.
    pub fn from_positions<I>(positions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = [f32; 3]>,
    {
        let joints = positions
            .into_iter()
            .enumerate()
            .map(|(id, position)| Joint { id, position })
            .collect();
        Self::new(joints)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Always false for a constructed registry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[inline]
    pub fn get(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }
}

/// A debris object: anything whose final resting place is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Human-readable name (e.g. "column_03").
    pub name: String,
    /// Center position (x, y, z).
    pub position: [f32; 3],
    /// Center height once the member has collapsed onto the ground.
    #[serde(default = "default_rest_height")]
    pub rest_height: f32,
}

fn default_rest_height() -> f32 {
    0.25
}

/// What the far side of a connection is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "member")]
pub enum Anchor {
    /// Fixed to the ground.
    Ground,
    /// Another member, by index.
    Member(usize),
}

/// A joint tying a member to another member or to the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The joint carrying this connection.
    pub joint: JointId,
    /// Member on the near side.
    pub member: usize,
    /// Far side.
    pub anchor: Anchor,
}

/// Full building description consumed by the reference collapse simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureModel {
    pub joints: Vec<Joint>,
    pub members: Vec<Member>,
    pub connections: Vec<Connection>,
}

impl StructureModel {
    /// Check that every connection references existing joints and members.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, c) in self.connections.iter().enumerate() {
            if c.joint >= self.joints.len() {
                return Err(ConfigError::InvalidConnection {
                    connection: i,
                    reason: format!("unknown joint {}", c.joint),
                });
            }
            if c.member >= self.members.len() {
                return Err(ConfigError::InvalidConnection {
                    connection: i,
                    reason: format!("unknown member {}", c.member),
                });
            }
            if let Anchor::Member(m) = c.anchor
                && m >= self.members.len()
            {
                return Err(ConfigError::InvalidConnection {
                    connection: i,
                    reason: format!("unknown anchor member {m}"),
                });
            }
        }
        Ok(())
    }

    /// Build the joint registry for this structure.
    pub fn registry(&self) -> Result<JointRegistry, ConfigError> {
        JointRegistry::new(self.joints.clone())
    }

    /// A small two-storey frame: four columns on the ground, a slab on top,
    /// one joint at each column base and one at each column head.
    pub fn example() -> Self {
        let corners = [(-2.0, -2.0), (2.0, -2.0), (2.0, 2.0), (-2.0, 2.0)];
        let mut joints = Vec::new();
        let mut members = Vec::new();
        let mut connections = Vec::new();

        let slab = corners.len();
        for (i, &(x, y)) in corners.iter().enumerate() {
            members.push(Member {
                name: format!("column_{i:02}"),
                position: [x, y, 2.0],
                rest_height: 0.2,
            });

            let base = joints.len();
            joints.push(Joint {
                id: base,
                position: [x, y, 0.0],
            });
            connections.push(Connection {
                joint: base,
                member: i,
                anchor: Anchor::Ground,
            });

            let head = joints.len();
            joints.push(Joint {
                id: head,
                position: [x, y, 4.0],
            });
            connections.push(Connection {
                joint: head,
                member: slab,
                anchor: Anchor::Member(i),
            });
        }
        members.push(Member {
            name: "slab_00".to_string(),
            position: [0.0, 0.0, 4.25],
            rest_height: 0.25,
        });

        Self {
            joints,
            members,
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_empty() {
        assert!(matches!(
            JointRegistry::new(Vec::new()),
            Err(ConfigError::EmptyRegistry)
        ));
    }

    #[test]
    fn test_registry_rejects_sparse_ids() {
        let joints = vec![
            Joint {
                id: 0,
                position: [0.0; 3],
            },
            Joint {
                id: 2,
                position: [1.0, 0.0, 0.0],
            },
        ];
        assert!(matches!(
            JointRegistry::new(joints),
            Err(ConfigError::JointIdMismatch { index: 1, id: 2 })
        ));
    }

    #[test]
    fn test_from_positions() {
        let registry =
            JointRegistry::from_positions([[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]).unwrap();
        assert_eq!(registry.len(), 2);
        let d = registry.get(0).unwrap().distance(registry.get(1).unwrap());
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_example_structure_valid() {
        let model = StructureModel::example();
        assert!(model.validate().is_ok());
        assert_eq!(model.registry().unwrap().len(), 8);
        assert_eq!(model.members.len(), 5);
    }

    #[test]
    fn test_invalid_connection() {
        let mut model = StructureModel::example();
        model.connections[0].member = 99;
        assert!(matches!(
            model.validate(),
            Err(ConfigError::InvalidConnection { connection: 0, .. })
        ));
    }

    #[test]
    fn test_structure_serialization() {
        let model = StructureModel::example();
        let json = serde_json::to_string(&model).unwrap();
        let parsed: StructureModel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.connections, model.connections);
    }
}
