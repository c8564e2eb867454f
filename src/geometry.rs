//! The in-memory geometry tree: tagged kinds (spec §3.1), zero-copy
//! coordinate storage (spec §3.5), and the type-tag vocabulary shared by the
//! header codec, the tree (de)serializer, and the comparator.

use std::borrow::Cow;

use scroll::{Pread, BE};

use crate::bbox::Bbox;
use crate::error::{GeometryCodecError, Result};
use crate::flags::Flags;
use crate::srid::Srid;

/// The fifteen wire type tags, grounded on `lwgeomTypeName`
/// (original_source/liblwgeom/lwutil.c) and the teacher's own
/// `WKBGeometryType` tag table (`wkb/wkb_common.rs`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u32)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
    CircularString = 8,
    CompoundCurve = 9,
    CurvePolygon = 10,
    MultiCurve = 11,
    MultiSurface = 12,
    PolyhedralSurface = 13,
    Triangle = 14,
    Tin = 15,
}

impl GeometryType {
    pub fn from_u32(tag: u32) -> Result<GeometryType> {
        use GeometryType::*;
        Ok(match tag {
            1 => Point,
            2 => LineString,
            3 => Polygon,
            4 => MultiPoint,
            5 => MultiLineString,
            6 => MultiPolygon,
            7 => GeometryCollection,
            8 => CircularString,
            9 => CompoundCurve,
            10 => CurvePolygon,
            11 => MultiCurve,
            12 => MultiSurface,
            13 => PolyhedralSurface,
            14 => Triangle,
            15 => Tin,
            other => return Err(GeometryCodecError::UnknownType(other)),
        })
    }

    pub fn name(self) -> &'static str {
        use GeometryType::*;
        match self {
            Point => "Point",
            LineString => "LineString",
            Polygon => "Polygon",
            MultiPoint => "MultiPoint",
            MultiLineString => "MultiLineString",
            MultiPolygon => "MultiPolygon",
            GeometryCollection => "GeometryCollection",
            CircularString => "CircularString",
            CompoundCurve => "CompoundCurve",
            CurvePolygon => "CurvePolygon",
            MultiCurve => "MultiCurve",
            MultiSurface => "MultiSurface",
            PolyhedralSurface => "PolyhedralSurface",
            Triangle => "Triangle",
            Tin => "Tin",
        }
    }

    pub fn is_collection(self) -> bool {
        use GeometryType::*;
        matches!(
            self,
            MultiPoint
                | MultiLineString
                | MultiPolygon
                | GeometryCollection
                | CompoundCurve
                | CurvePolygon
                | MultiCurve
                | MultiSurface
                | PolyhedralSurface
                | Tin
        )
    }
}

/// A run of coordinate tuples stored exactly as they appear on the wire:
/// consecutive big-endian `f64`s, `flags.ndims()` per tuple. Decoded
/// instances borrow straight from the record buffer; constructed ones own a
/// freshly packed `Vec<u8>`. Either way the accessor logic is identical.
#[derive(Clone, PartialEq, Debug)]
pub struct CoordSeq<'a> {
    flags: Flags,
    data: Cow<'a, [u8]>,
}

impl<'a> CoordSeq<'a> {
    /// Wrap a byte run already in wire format (used by `decode`/`peek`).
    pub fn from_wire(flags: Flags, data: Cow<'a, [u8]>) -> CoordSeq<'a> {
        CoordSeq { flags, data }
    }

    /// Pack tuples of `(x, y, z, m)` into an owned wire-format run. `z`/`m`
    /// are ignored when `flags` does not carry that dimension.
    pub fn from_tuples(flags: Flags, tuples: &[(f64, f64, Option<f64>, Option<f64>)]) -> CoordSeq<'static> {
        let ndims = flags.ndims();
        let mut data = Vec::with_capacity(tuples.len() * ndims * 8);
        for &(x, y, z, m) in tuples {
            data.extend_from_slice(&x.to_be_bytes());
            data.extend_from_slice(&y.to_be_bytes());
            if flags.has_z() {
                data.extend_from_slice(&z.unwrap_or(0.0).to_be_bytes());
            }
            if flags.has_m() {
                data.extend_from_slice(&m.unwrap_or(0.0).to_be_bytes());
            }
        }
        CoordSeq {
            flags,
            data: Cow::Owned(data),
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len() / (self.flags.ndims() * 8)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read tuple `i` as `(x, y, z, m)`, `z`/`m` absent when the flags say so.
    pub fn get(&self, i: usize) -> Option<(f64, f64, Option<f64>, Option<f64>)> {
        let ndims = self.flags.ndims();
        let stride = ndims * 8;
        let start = i.checked_mul(stride)?;
        if start + stride > self.data.len() {
            return None;
        }
        let read = |at: usize| -> f64 {
            self.data
                .pread_with::<f64>(at, BE)
                .expect("bounds already checked above")
        };
        let x = read(start);
        let y = read(start + 8);
        let mut offset = start + 16;
        let z = if self.flags.has_z() {
            let v = read(offset);
            offset += 8;
            Some(v)
        } else {
            None
        };
        let m = if self.flags.has_m() {
            Some(read(offset))
        } else {
            None
        };
        Some((x, y, z, m))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, Option<f64>, Option<f64>)> + '_ {
        (0..self.len()).map(move |i| self.get(i).expect("index within len()"))
    }

    pub fn into_owned(self) -> CoordSeq<'static> {
        CoordSeq {
            flags: self.flags,
            data: Cow::Owned(self.data.into_owned()),
        }
    }
}

/// The shape of a geometry node, independent of its flags/SRID (spec §3.1).
#[derive(Clone, PartialEq, Debug)]
pub enum GeometryBody<'a> {
    Point(CoordSeq<'a>),
    LineString(CoordSeq<'a>),
    Polygon(Vec<CoordSeq<'a>>),
    MultiPoint(Vec<Geometry<'a>>),
    MultiLineString(Vec<Geometry<'a>>),
    MultiPolygon(Vec<Geometry<'a>>),
    GeometryCollection(Vec<Geometry<'a>>),
    CircularString(CoordSeq<'a>),
    CompoundCurve(Vec<Geometry<'a>>),
    CurvePolygon(Vec<Geometry<'a>>),
    MultiCurve(Vec<Geometry<'a>>),
    MultiSurface(Vec<Geometry<'a>>),
    PolyhedralSurface(Vec<Geometry<'a>>),
    Triangle(CoordSeq<'a>),
    Tin(Vec<Geometry<'a>>),
}

impl<'a> GeometryBody<'a> {
    pub fn kind(&self) -> GeometryType {
        use GeometryBody::*;
        match self {
            Point(_) => GeometryType::Point,
            LineString(_) => GeometryType::LineString,
            Polygon(_) => GeometryType::Polygon,
            MultiPoint(_) => GeometryType::MultiPoint,
            MultiLineString(_) => GeometryType::MultiLineString,
            MultiPolygon(_) => GeometryType::MultiPolygon,
            GeometryCollection(_) => GeometryType::GeometryCollection,
            CircularString(_) => GeometryType::CircularString,
            CompoundCurve(_) => GeometryType::CompoundCurve,
            CurvePolygon(_) => GeometryType::CurvePolygon,
            MultiCurve(_) => GeometryType::MultiCurve,
            MultiSurface(_) => GeometryType::MultiSurface,
            PolyhedralSurface(_) => GeometryType::PolyhedralSurface,
            Triangle(_) => GeometryType::Triangle,
            Tin(_) => GeometryType::Tin,
        }
    }

    pub fn children(&self) -> Option<&[Geometry<'a>]> {
        use GeometryBody::*;
        match self {
            MultiPoint(v) | MultiLineString(v) | MultiPolygon(v) | GeometryCollection(v)
            | CompoundCurve(v) | CurvePolygon(v) | MultiCurve(v) | MultiSurface(v)
            | PolyhedralSurface(v) | Tin(v) => Some(v),
            _ => None,
        }
    }
}

/// A decoded or to-be-encoded geometry node: the wire-relevant metadata
/// (`flags`, `srid`) alongside its shape and an optional cached bounding box
/// (spec §3.1). Only ever populated on the root — sub-geometries of a
/// collection never carry one (spec §4.4 step 5).
#[derive(Clone, PartialEq, Debug)]
pub struct Geometry<'a> {
    pub srid: Srid,
    pub flags: Flags,
    pub body: GeometryBody<'a>,
    pub cached_bbox: Option<Bbox>,
}

impl<'a> Geometry<'a> {
    pub fn new(srid: Srid, flags: Flags, body: GeometryBody<'a>) -> Geometry<'a> {
        Geometry {
            srid,
            flags,
            body,
            cached_bbox: None,
        }
    }

    /// Attach an explicit bbox, the way a caller who already computed one
    /// (or a `decode` that read one off the wire) would.
    pub fn with_cached_bbox(mut self, bbox: Option<Bbox>) -> Geometry<'a> {
        self.cached_bbox = bbox;
        self
    }

    pub fn kind(&self) -> GeometryType {
        self.body.kind()
    }

    /// True when this node carries no coordinates and no non-empty children.
    pub fn is_empty(&self) -> bool {
        use GeometryBody::*;
        match &self.body {
            Point(c) | LineString(c) | CircularString(c) | Triangle(c) => c.is_empty(),
            Polygon(rings) => rings.is_empty(),
            MultiPoint(g) | MultiLineString(g) | MultiPolygon(g) | GeometryCollection(g)
            | CompoundCurve(g) | CurvePolygon(g) | MultiCurve(g) | MultiSurface(g)
            | PolyhedralSurface(g) | Tin(g) => g.iter().all(Geometry::is_empty),
        }
    }

    /// Detach from any borrowed buffer, copying every coordinate run.
    pub fn into_owned(self) -> Geometry<'static> {
        use GeometryBody::*;
        let body = match self.body {
            Point(c) => Point(c.into_owned()),
            LineString(c) => LineString(c.into_owned()),
            CircularString(c) => CircularString(c.into_owned()),
            Triangle(c) => Triangle(c.into_owned()),
            Polygon(rings) => Polygon(rings.into_iter().map(CoordSeq::into_owned).collect()),
            MultiPoint(g) => MultiPoint(owned_children(g)),
            MultiLineString(g) => MultiLineString(owned_children(g)),
            MultiPolygon(g) => MultiPolygon(owned_children(g)),
            GeometryCollection(g) => GeometryCollection(owned_children(g)),
            CompoundCurve(g) => CompoundCurve(owned_children(g)),
            CurvePolygon(g) => CurvePolygon(owned_children(g)),
            MultiCurve(g) => MultiCurve(owned_children(g)),
            MultiSurface(g) => MultiSurface(owned_children(g)),
            PolyhedralSurface(g) => PolyhedralSurface(owned_children(g)),
            Tin(g) => Tin(owned_children(g)),
        };
        Geometry {
            srid: self.srid,
            flags: self.flags,
            body,
            cached_bbox: self.cached_bbox,
        }
    }
}

fn owned_children(children: Vec<Geometry<'_>>) -> Vec<Geometry<'static>> {
    children.into_iter().map(Geometry::into_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_seq_round_trips_xyz() {
        let flags = Flags::new(true, false, false);
        let seq = CoordSeq::from_tuples(flags, &[(1.0, 2.0, Some(3.0), None)]);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.get(0), Some((1.0, 2.0, Some(3.0), None)));
    }

    #[test]
    fn empty_point_has_no_coordinates() {
        let flags = Flags::new(false, false, false);
        let point = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[])),
        );
        assert!(point.is_empty());
    }

    #[test]
    fn type_tag_round_trips() {
        for tag in 1..=15u32 {
            let kind = GeometryType::from_u32(tag).unwrap();
            assert_eq!(kind as u32, tag);
        }
        assert!(GeometryType::from_u32(16).is_err());
    }
}
