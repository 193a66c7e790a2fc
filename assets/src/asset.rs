//! Shared asset base class and bounding volumes.

use glam::Vec3;
use redlilium_persist::{Class, Fields, TypeTag};
use serde::{Deserialize, Serialize};

/// Root of the resource hierarchy.
///
/// Every named asset (mesh, skeleton, animation) embeds an `Asset` as its
/// base part. The name doubles as the resource cache key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Asset {
    pub name: String,
}

impl Asset {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Class for Asset {
    const TAG: TypeTag = TypeTag::from_fourcc(b"ASET");
    const NAME: &'static str = "Asset";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("name", |a| &a.name, |a| &mut a.name)
            .resource_key(|a| a.name.as_str());
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point. Empty input gives the zero box.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some((&first, rest)) = points.split_first() else {
            return Self::default();
        };
        rest.iter().fold(Self::new(first, first), |acc, &p| {
            Self::new(acc.min.min(p), acc.max.max(p))
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
