//! Bytes -> tree, zero-copy. Grounded on `lwgeom_from_gserialized` and
//! `lw*_from_gserialized_buffer` (original_source).

use std::borrow::Cow;

use scroll::{Pread, BE};

use crate::bbox::{bbox_size, read_bbox};
use crate::error::{GeometryCodecError, Result};
use crate::flags::Flags;
use crate::geometry::{CoordSeq, Geometry, GeometryBody, GeometryType};
use crate::policy::GeometryPolicy;
use crate::srid::{read_srid, Srid};

/// Decode a complete serialized record into a geometry tree borrowing its
/// coordinate runs from `buf`.
pub fn decode<'a>(buf: &'a [u8], policy: &impl GeometryPolicy) -> Result<Geometry<'a>> {
    if buf.len() < 8 {
        return Err(GeometryCodecError::TruncatedRecord {
            offset: 0,
            needed: 8,
            available: buf.len(),
        });
    }
    // Low 2 bits are the host storage layer's varlen flags (spec §3.2, §6),
    // not part of the size — stripped here rather than trusted as zero,
    // since the surrounding system owns and may set them.
    let declared_size = (read_u32(buf, 0)? >> 2) as usize;
    if declared_size != buf.len() {
        return Err(GeometryCodecError::SizeMismatch {
            expected: declared_size,
            actual: buf.len(),
        });
    }
    let srid = read_srid(buf, 4)?;
    let flags = Flags(buf[7]);

    let mut offset = 8;
    let header_bbox = if flags.has_bbox() {
        let bbox = read_bbox(buf, offset, flags)?;
        offset += bbox_size(flags);
        Some(bbox)
    } else {
        None
    };

    let body = read_body(buf, &mut offset, flags.set_bbox(false), srid, policy)?;
    let kind = body.kind();
    if let Some(children) = body.children() {
        for child in children {
            if !policy.allows_subtype(kind, child.kind()) {
                return Err(GeometryCodecError::SubtypeNotAllowed {
                    parent: kind,
                    child: child.kind(),
                });
            }
        }
    }

    let geom = Geometry {
        srid,
        flags,
        body,
        cached_bbox: None,
    };
    // spec §4.4 step 6: a bbox read off the wire is attached as-is; one
    // that wasn't stored is computed here iff the kind needs it.
    let cached_bbox = match header_bbox {
        Some(bbox) => Some(bbox),
        None if policy.needs_bbox(&geom) => policy.calculate_bbox(&geom),
        None => None,
    };
    Ok(geom.with_cached_bbox(cached_bbox))
}

fn read_node<'a>(
    buf: &'a [u8],
    offset: &mut usize,
    flags: Flags,
    srid: Srid,
    policy: &impl GeometryPolicy,
) -> Result<Geometry<'a>> {
    let body = read_body(buf, offset, flags, srid, policy)?;
    let kind = body.kind();
    if let Some(children) = body.children() {
        for child in children {
            if !policy.allows_subtype(kind, child.kind()) {
                return Err(GeometryCodecError::SubtypeNotAllowed {
                    parent: kind,
                    child: child.kind(),
                });
            }
        }
    }
    // Sub-geometries never carry a bbox of their own (spec §4.4 step 5).
    Ok(Geometry {
        srid,
        flags,
        body,
        cached_bbox: None,
    })
}

fn read_body<'a>(
    buf: &'a [u8],
    offset: &mut usize,
    flags: Flags,
    srid: Srid,
    policy: &impl GeometryPolicy,
) -> Result<GeometryBody<'a>> {
    let tag = read_u32(buf, *offset)?;
    *offset += 4;
    let kind = GeometryType::from_u32(tag)?;

    Ok(match kind {
        GeometryType::Point => GeometryBody::Point(read_coord_seq(buf, offset, flags)?),
        GeometryType::LineString => GeometryBody::LineString(read_coord_seq(buf, offset, flags)?),
        GeometryType::CircularString => {
            GeometryBody::CircularString(read_coord_seq(buf, offset, flags)?)
        }
        GeometryType::Triangle => GeometryBody::Triangle(read_coord_seq(buf, offset, flags)?),
        GeometryType::Polygon => GeometryBody::Polygon(read_rings(buf, offset, flags)?),
        GeometryType::MultiPoint => {
            GeometryBody::MultiPoint(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::MultiLineString => {
            GeometryBody::MultiLineString(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::MultiPolygon => {
            GeometryBody::MultiPolygon(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::GeometryCollection => {
            GeometryBody::GeometryCollection(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::CompoundCurve => {
            GeometryBody::CompoundCurve(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::CurvePolygon => {
            GeometryBody::CurvePolygon(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::MultiCurve => {
            GeometryBody::MultiCurve(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::MultiSurface => {
            GeometryBody::MultiSurface(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::PolyhedralSurface => {
            GeometryBody::PolyhedralSurface(read_children(buf, offset, flags, srid, policy)?)
        }
        GeometryType::Tin => GeometryBody::Tin(read_children(buf, offset, flags, srid, policy)?),
    })
}

fn read_coord_seq<'a>(buf: &'a [u8], offset: &mut usize, flags: Flags) -> Result<CoordSeq<'a>> {
    let npoints = read_u32(buf, *offset)? as usize;
    *offset += 4;
    let nbytes = npoints
        .checked_mul(flags.ndims() * 8)
        .ok_or(GeometryCodecError::TruncatedRecord {
            offset: *offset,
            needed: usize::MAX,
            available: buf.len(),
        })?;
    if buf.len() < *offset + nbytes {
        return Err(GeometryCodecError::TruncatedRecord {
            offset: *offset,
            needed: nbytes,
            available: buf.len().saturating_sub(*offset),
        });
    }
    let data = &buf[*offset..*offset + nbytes];
    *offset += nbytes;
    Ok(CoordSeq::from_wire(flags, Cow::Borrowed(data)))
}

fn read_rings<'a>(buf: &'a [u8], offset: &mut usize, flags: Flags) -> Result<Vec<CoordSeq<'a>>> {
    let nrings = read_u32(buf, *offset)? as usize;
    *offset += 4;
    if nrings % 2 == 1 {
        *offset += 4;
    }
    let mut rings = Vec::with_capacity(nrings);
    for _ in 0..nrings {
        rings.push(read_coord_seq(buf, offset, flags)?);
    }
    Ok(rings)
}

fn read_children<'a>(
    buf: &'a [u8],
    offset: &mut usize,
    flags: Flags,
    srid: Srid,
    policy: &impl GeometryPolicy,
) -> Result<Vec<Geometry<'a>>> {
    let ngeoms = read_u32(buf, *offset)? as usize;
    *offset += 4;
    let mut children = Vec::with_capacity(ngeoms);
    for _ in 0..ngeoms {
        children.push(read_node(buf, offset, flags, srid, policy)?);
    }
    Ok(children)
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    buf.pread_with(offset, BE)
        .map_err(|_| GeometryCodecError::TruncatedRecord {
            offset,
            needed: 4,
            available: buf.len().saturating_sub(offset),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::flags::Flags;
    use crate::policy::DefaultPolicy;

    #[test]
    fn round_trips_empty_point() {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(
            Srid(4326),
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[])),
        );
        let bytes = encode(&geom, &DefaultPolicy).unwrap();
        let decoded = decode(&bytes, &DefaultPolicy).unwrap();
        assert_eq!(decoded.srid, Srid(4326));
        assert!(decoded.is_empty());
    }

    #[test]
    fn round_trips_linestring_with_bbox() {
        let flags = Flags::new(true, false, false);
        let line = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[
                    (0.0, 0.0, Some(0.0), None),
                    (1.0, 2.0, Some(3.0), None),
                ],
            )),
        );
        let bytes = encode(&line, &DefaultPolicy).unwrap();
        let decoded = decode(&bytes, &DefaultPolicy).unwrap();
        match decoded.body {
            GeometryBody::LineString(c) => {
                assert_eq!(c.len(), 2);
                assert_eq!(c.get(1), Some((1.0, 2.0, Some(3.0), None)));
            }
            _ => panic!("expected LineString"),
        }
    }

    #[test]
    fn truncated_record_errors() {
        let buf = [0u8; 4];
        assert!(decode(&buf, &DefaultPolicy).is_err());
    }

    #[test]
    fn mismatched_size_word_errors() {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[(1.0, 2.0, None, None)])),
        );
        let mut bytes = encode(&geom, &DefaultPolicy).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode(&bytes, &DefaultPolicy),
            Err(GeometryCodecError::SizeMismatch { .. })
        ));
    }
}
