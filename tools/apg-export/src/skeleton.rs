//! Skeleton linearization
//!
//! Turns the host's named bone collection into a flat array where each
//! bone's id is its declaration position and parents are referenced by id.

use hashbrown::{HashMap, HashSet};

use crate::error::{ExportError, Result};
use crate::host::Armature;

/// A linearized bone
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub id: usize,
    pub parent: Option<usize>,
    pub name: String,
}

impl Bone {
    /// Parent id as written to the hierarchy block (-1 for roots)
    pub fn parent_id(&self) -> i32 {
        self.parent.map_or(-1, |p| p as i32)
    }
}

/// Bones in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Linearize an armature.
///
/// Bone names must be unique, every parent name must resolve to a bone of
/// the same armature, and no parent chain may loop.
pub fn linearize(armature: &Armature) -> Result<Skeleton> {
    let bones = armature.bones();

    let mut ids: HashMap<&str, usize> = HashMap::with_capacity(bones.len());
    for (id, bone) in bones.iter().enumerate() {
        if ids.insert(bone.name.as_str(), id).is_some() {
            return Err(ExportError::DuplicateBoneName {
                bone: bone.name.clone(),
            });
        }
    }

    let parents = bones
        .iter()
        .map(|bone| match &bone.parent {
            None => Ok(None),
            Some(parent) => ids
                .get(parent.as_str())
                .map(|&id| Some(id))
                .ok_or_else(|| ExportError::UnknownParentBone {
                    bone: bone.name.clone(),
                    parent: parent.clone(),
                }),
        })
        .collect::<Result<Vec<Option<usize>>>>()?;

    for start in 0..bones.len() {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(ExportError::CyclicHierarchy {
                    bone: bones[start].name.clone(),
                });
            }
            current = parents[id];
        }
    }

    Ok(Skeleton {
        name: armature.name.clone(),
        bones: bones
            .iter()
            .zip(parents)
            .enumerate()
            .map(|(id, (bone, parent))| Bone {
                id,
                parent,
                name: bone.name.clone(),
            })
            .collect(),
    })
}
