//! The pluggable "collaborators" contract: bbox derivation, the decision to
//! store a bbox at all, and collection-membership rules. `DefaultPolicy`
//! makes the crate usable standalone; callers with different needs swap in
//! their own `GeometryPolicy`, the way this codebase threads a configurable
//! writer dialect through its WKB encoder.

use crate::bbox::Bbox;
use crate::geometry::{Geometry, GeometryType};

pub trait GeometryPolicy {
    /// Compute the bounding box of `geom`, or `None` if it is empty.
    fn calculate_bbox(&self, geom: &Geometry) -> Option<Bbox>;

    /// Whether `encode` should store a bbox for this geometry.
    fn needs_bbox(&self, geom: &Geometry) -> bool;

    /// Whether `child` may appear inside a `parent` collection.
    fn allows_subtype(&self, parent: GeometryType, child: GeometryType) -> bool;
}

#[derive(Clone, Copy, Default, Debug)]
pub struct DefaultPolicy;

impl GeometryPolicy for DefaultPolicy {
    fn calculate_bbox(&self, geom: &Geometry) -> Option<Bbox> {
        if geom.is_empty() {
            return None;
        }
        let mut bbox = Bbox::default();
        accumulate(geom, geom.flags.is_geodetic(), &mut bbox);
        Some(bbox)
    }

    /// Matches `lwgeom_needs_bbox`: every kind except `Point` gets a bbox,
    /// and an empty geometry never does (there is nothing to bound).
    fn needs_bbox(&self, geom: &Geometry) -> bool {
        if geom.is_empty() {
            return false;
        }
        geom.kind() != GeometryType::Point
    }

    fn allows_subtype(&self, parent: GeometryType, child: GeometryType) -> bool {
        use GeometryType::*;
        match parent {
            MultiPoint => child == Point,
            MultiLineString => child == LineString,
            MultiPolygon => child == Polygon,
            GeometryCollection => true,
            CompoundCurve => matches!(child, LineString | CircularString),
            CurvePolygon => matches!(child, LineString | CircularString | CompoundCurve),
            MultiCurve => matches!(child, LineString | CircularString | CompoundCurve),
            MultiSurface => matches!(child, Polygon | CurvePolygon),
            PolyhedralSurface => child == Polygon,
            Tin => child == Triangle,
            _ => false,
        }
    }
}

/// Expand `bbox` over every coordinate of `geom`. Under geodetic flags, the
/// box tracks geocentric (X, Y, Z) on the unit sphere (spec §3.3) rather
/// than raw (lon, lat[, z][, m]) — `expand_coord` is handed the projected
/// triple with no fourth ordinate, since geodetic boxes never carry M.
fn accumulate(geom: &Geometry, geodetic: bool, bbox: &mut Bbox) {
    use crate::geometry::GeometryBody::*;

    let mut expand_run = |c: &crate::geometry::CoordSeq| {
        for (x, y, z, m) in c.iter() {
            if geodetic {
                let (gx, gy, gz) = crate::bbox::geodetic_to_geocentric(x, y);
                bbox.expand_coord(gx, gy, Some(gz), None);
            } else {
                bbox.expand_coord(x, y, z, m);
            }
        }
    };

    match &geom.body {
        Point(c) | LineString(c) | CircularString(c) | Triangle(c) => expand_run(c),
        Polygon(rings) => {
            for ring in rings {
                expand_run(ring);
            }
        }
        MultiPoint(g) | MultiLineString(g) | MultiPolygon(g) | GeometryCollection(g)
        | CompoundCurve(g) | CurvePolygon(g) | MultiCurve(g) | MultiSurface(g)
        | PolyhedralSurface(g) | Tin(g) => {
            for child in g {
                accumulate(child, geodetic, bbox);
            }
        }
    }
}
