use geo_types::Geometry;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference { wkid: 4326 };
    pub const WEB_MERCATOR: SpatialReference = SpatialReference { wkid: 3857 };

    pub const fn new(wkid: u32) -> Self {
        Self { wkid }
    }
}

/// A geometry tagged with the spatial reference its coordinates are in.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGeometry {
    pub geometry: Geometry,
    pub spatial_reference: SpatialReference,
}

impl SpatialGeometry {
    pub fn new(geometry: impl Into<Geometry>, spatial_reference: SpatialReference) -> Self {
        Self {
            geometry: geometry.into(),
            spatial_reference,
        }
    }

    pub fn wgs84(geometry: impl Into<Geometry>) -> Self {
        Self::new(geometry, SpatialReference::WGS84)
    }
}
