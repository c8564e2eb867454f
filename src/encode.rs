//! Tree -> bytes. Grounded on `gserialized_from_lwgeom_size` and
//! `gserialized_from_lwgeom`/`gserialized_from_lw*` (original_source).

use scroll::{Pwrite, BE};

use crate::error::{GeometryCodecError, Result};
use crate::flags::{header_size, Flags};
use crate::geometry::{Geometry, GeometryBody};
use crate::policy::GeometryPolicy;
use crate::srid::write_srid;

/// Whether `encode` will store a bbox for `geom`: a bbox already cached on
/// the geometry (spec §3.1) is reused as-is; otherwise one is computed iff
/// `policy` says the kind needs it (spec §4.3 step 1).
fn resolve_bbox(geom: &Geometry, policy: &impl GeometryPolicy) -> Option<crate::bbox::Bbox> {
    geom.cached_bbox
        .or_else(|| policy.needs_bbox(geom).then(|| policy.calculate_bbox(geom)).flatten())
}

/// The exact byte length `encode` will produce for `geom` under `policy`.
/// Callers that want to preallocate (or just check size limits) can call
/// this without paying for the write.
pub fn size_of(geom: &Geometry, policy: &impl GeometryPolicy) -> usize {
    let flags = geom.flags.set_bbox(resolve_bbox(geom, policy).is_some());
    header_size(flags) + node_size(geom)
}

fn node_size(geom: &Geometry) -> usize {
    use GeometryBody::*;
    4 + match &geom.body {
        Point(c) | LineString(c) | CircularString(c) | Triangle(c) => 4 + c.as_bytes().len(),
        Polygon(rings) => {
            let mut size = 4;
            if rings.len() % 2 == 1 {
                size += 4;
            }
            for ring in rings {
                size += 4 + ring.as_bytes().len();
            }
            size
        }
        MultiPoint(children)
        | MultiLineString(children)
        | MultiPolygon(children)
        | GeometryCollection(children)
        | CompoundCurve(children)
        | CurvePolygon(children)
        | MultiCurve(children)
        | MultiSurface(children)
        | PolyhedralSurface(children)
        | Tin(children) => {
            let mut size = 4;
            for child in children {
                size += node_size(child);
            }
            size
        }
    }
}

/// Encode `geom` as a complete serialized record.
pub fn encode(geom: &Geometry, policy: &impl GeometryPolicy) -> Result<Vec<u8>> {
    validate(geom.flags.zm(), geom, policy)?;

    let bbox = resolve_bbox(geom, policy);
    let flags = geom.flags.set_bbox(bbox.is_some());
    let total = header_size(flags) + node_size(geom);
    let mut buf = vec![0u8; total];

    // The low 2 bits of the outer word are the host storage layer's varlen
    // flags (spec §3.2, §6) — the codec only ever writes zero there, leaving
    // them for the surrounding system to set on top of this buffer.
    write_u32(&mut buf, 0, (total as u32) << 2);
    write_srid(&mut buf, 4, geom.srid)?;
    buf[7] = flags.0;

    let mut offset = 8;
    if let Some(bbox) = bbox {
        crate::bbox::write_bbox(&mut buf, offset, flags, &bbox)?;
        offset += crate::bbox::bbox_size(flags);
    }

    write_node(&mut buf, &mut offset, geom)?;

    if offset != total {
        return Err(GeometryCodecError::SizeMismatch {
            expected: total,
            actual: offset,
        });
    }
    Ok(buf)
}

fn validate(root_zm: (bool, bool), geom: &Geometry, policy: &impl GeometryPolicy) -> Result<()> {
    if geom.flags.zm() != root_zm {
        return Err(GeometryCodecError::DimensionMismatch);
    }
    let leaf_ok = match &geom.body {
        GeometryBody::Point(c)
        | GeometryBody::LineString(c)
        | GeometryBody::CircularString(c)
        | GeometryBody::Triangle(c) => c.flags().zm() == root_zm,
        GeometryBody::Polygon(rings) => rings.iter().all(|r| r.flags().zm() == root_zm),
        _ => true,
    };
    if !leaf_ok {
        return Err(GeometryCodecError::DimensionMismatch);
    }
    if let Some(children) = geom.body.children() {
        let parent = geom.kind();
        for child in children {
            if !policy.allows_subtype(parent, child.kind()) {
                return Err(GeometryCodecError::SubtypeNotAllowed {
                    parent,
                    child: child.kind(),
                });
            }
            validate(root_zm, child, policy)?;
        }
    }
    Ok(())
}

fn write_node(buf: &mut [u8], offset: &mut usize, geom: &Geometry) -> Result<()> {
    write_u32(buf, *offset, geom.kind() as u32);
    *offset += 4;
    match &geom.body {
        GeometryBody::Point(c)
        | GeometryBody::LineString(c)
        | GeometryBody::CircularString(c)
        | GeometryBody::Triangle(c) => {
            write_u32(buf, *offset, c.len() as u32);
            *offset += 4;
            write_coords(buf, offset, c.as_bytes());
        }
        GeometryBody::Polygon(rings) => {
            write_u32(buf, *offset, rings.len() as u32);
            *offset += 4;
            if rings.len() % 2 == 1 {
                write_u32(buf, *offset, 0);
                *offset += 4;
            }
            for ring in rings {
                write_u32(buf, *offset, ring.len() as u32);
                *offset += 4;
                write_coords(buf, offset, ring.as_bytes());
            }
        }
        GeometryBody::MultiPoint(children)
        | GeometryBody::MultiLineString(children)
        | GeometryBody::MultiPolygon(children)
        | GeometryBody::GeometryCollection(children)
        | GeometryBody::CompoundCurve(children)
        | GeometryBody::CurvePolygon(children)
        | GeometryBody::MultiCurve(children)
        | GeometryBody::MultiSurface(children)
        | GeometryBody::PolyhedralSurface(children)
        | GeometryBody::Tin(children) => {
            write_u32(buf, *offset, children.len() as u32);
            *offset += 4;
            for child in children {
                write_node(buf, offset, child)?;
            }
        }
    }
    Ok(())
}

fn write_coords(buf: &mut [u8], offset: &mut usize, coords: &[u8]) {
    buf[*offset..*offset + coords.len()].copy_from_slice(coords);
    *offset += coords.len();
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf.pwrite_with(value, offset, BE)
        .expect("buffer sized by size_of before encode starts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Flags;
    use crate::geometry::CoordSeq;
    use crate::policy::DefaultPolicy;
    use crate::srid::Srid;

    #[test]
    fn encode_empty_point_is_sixteen_bytes() {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(
            Srid(4326),
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[])),
        );
        let bytes = encode(&geom, &DefaultPolicy).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes.len(), size_of(&geom, &DefaultPolicy));
    }

    #[test]
    fn encode_xyzm_point_without_srid_or_bbox_is_forty_eight_bytes() {
        let flags = Flags::new(true, true, false);
        let geom = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(
                flags,
                &[(1.0, 2.0, Some(3.0), Some(4.0))],
            )),
        );
        let bytes = encode(&geom, &DefaultPolicy).unwrap();
        // header (8, Point needs no bbox) + type tag (4) + npoints (4) + 4 ordinates * 8 bytes.
        assert_eq!(bytes.len(), 8 + 4 + 4 + 4 * 8);
    }

    #[test]
    fn encode_2d_point_without_srid_or_bbox_is_thirty_two_bytes() {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[(1.0, 2.0, None, None)])),
        );
        let bytes = encode(&geom, &DefaultPolicy).unwrap();
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn rejects_disallowed_subtype() {
        let flags = Flags::new(false, false, false);
        let line = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[(0.0, 0.0, None, None), (1.0, 1.0, None, None)],
            )),
        );
        let multipoint = Geometry::new(Srid::UNKNOWN, flags, GeometryBody::MultiPoint(vec![line]));
        let err = encode(&multipoint, &DefaultPolicy).unwrap_err();
        assert!(matches!(err, GeometryCodecError::SubtypeNotAllowed { .. }));
    }
}
