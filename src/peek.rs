//! Byte-level shortcuts that avoid a full tree decode: `peek_bbox` derives a
//! box straight from the record shape when possible, `peek_first_point`
//! reads a single coordinate. Grounded on `gserialized_peek_gbox_p` and
//! `gserialized_peek_first_point` (original_source).

use scroll::{Pread, BE};

use crate::bbox::{bbox_size, read_bbox, Bbox};
use crate::error::{GeometryCodecError, Result};
use crate::flags::Flags;
use crate::geometry::GeometryType;
use crate::srid::read_srid;

/// Flags and the offset of the tagged body, read directly off the header.
/// Shared with `compare`, which needs the identical header-skip routine for
/// its fast-path type-tag read (spec §9 open question).
pub(crate) fn header(buf: &[u8]) -> Result<(Flags, usize)> {
    if buf.len() < 8 {
        return Err(GeometryCodecError::TruncatedRecord {
            offset: 0,
            needed: 8,
            available: buf.len(),
        });
    }
    let flags = Flags(buf[7]);
    let mut body_offset = 8;
    if flags.has_bbox() {
        body_offset += bbox_size(flags);
    }
    Ok((flags, body_offset))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    buf.pread_with(offset, BE)
        .map_err(|_| GeometryCodecError::TruncatedRecord {
            offset,
            needed: 4,
            available: buf.len().saturating_sub(offset),
        })
}

fn read_f64(buf: &[u8], offset: usize) -> Result<f64> {
    buf.pread_with(offset, BE)
        .map_err(|_| GeometryCodecError::TruncatedRecord {
            offset,
            needed: 8,
            available: buf.len().saturating_sub(offset),
        })
}

/// Read one coordinate tuple starting at `offset`, honoring `flags`'s Z/M.
fn read_coord(buf: &[u8], offset: usize, flags: Flags) -> Result<(f64, f64, Option<f64>, Option<f64>)> {
    let x = read_f64(buf, offset)?;
    let y = read_f64(buf, offset + 8)?;
    let mut cursor = offset + 16;
    let z = if flags.has_z() {
        let v = read_f64(buf, cursor)?;
        cursor += 8;
        Some(v)
    } else {
        None
    };
    let m = if flags.has_m() {
        Some(read_f64(buf, cursor)?)
    } else {
        None
    };
    Ok((x, y, z, m))
}

/// If the header already carries a bbox, return it directly. Otherwise try
/// to derive a box from the shape of the body without doing a full decode:
/// a non-empty Point, a 2-point LineString, a single-point MultiPoint, or a
/// MultiLineString holding exactly one 2-point line all have their extent
/// spelled out by their own coordinates. Anything else returns
/// `PeekNotDerivable`.
///
/// Geodetic records never take the derived path, matching
/// `gserialized_peek_gbox_p` (original_source): computing a geocentric
/// extent from one or two lon/lat points isn't "peeking" cheaply, so a
/// geodetic geometry without a stored bbox falls back to a full decode.
pub fn peek_bbox(buf: &[u8]) -> Result<Bbox> {
    let (flags, body_offset) = header(buf)?;
    if flags.has_bbox() {
        return read_bbox(buf, 8, flags);
    }
    if flags.is_geodetic() {
        return Err(GeometryCodecError::PeekNotDerivable);
    }

    let tag = read_u32(buf, body_offset)?;
    let kind = GeometryType::from_u32(tag)?;
    let mut offset = body_offset + 4;

    match kind {
        GeometryType::Point => {
            let npoints = read_u32(buf, offset)?;
            if npoints == 0 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            let (x, y, z, m) = read_coord(buf, offset + 4, flags)?;
            let mut bbox = Bbox::default();
            bbox.expand_coord(x, y, z, m);
            crate::bbox::widen_to_stored_precision(flags, &bbox)
        }
        GeometryType::LineString => {
            let npoints = read_u32(buf, offset)?;
            if npoints != 2 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let mut bbox = Bbox::default();
            let (x0, y0, z0, m0) = read_coord(buf, offset, flags)?;
            bbox.expand_coord(x0, y0, z0, m0);
            let (x1, y1, z1, m1) = read_coord(buf, offset + flags.ndims() * 8, flags)?;
            bbox.expand_coord(x1, y1, z1, m1);
            crate::bbox::widen_to_stored_precision(flags, &bbox)
        }
        GeometryType::MultiPoint => {
            let ngeoms = read_u32(buf, offset)?;
            if ngeoms != 1 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let inner_tag = read_u32(buf, offset)?;
            if GeometryType::from_u32(inner_tag)? != GeometryType::Point {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let npoints = read_u32(buf, offset)?;
            if npoints == 0 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            let (x, y, z, m) = read_coord(buf, offset + 4, flags)?;
            let mut bbox = Bbox::default();
            bbox.expand_coord(x, y, z, m);
            crate::bbox::widen_to_stored_precision(flags, &bbox)
        }
        GeometryType::MultiLineString => {
            let ngeoms = read_u32(buf, offset)?;
            if ngeoms != 1 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let inner_tag = read_u32(buf, offset)?;
            if GeometryType::from_u32(inner_tag)? != GeometryType::LineString {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let npoints = read_u32(buf, offset)?;
            if npoints != 2 {
                return Err(GeometryCodecError::PeekNotDerivable);
            }
            offset += 4;
            let mut bbox = Bbox::default();
            let (x0, y0, z0, m0) = read_coord(buf, offset, flags)?;
            bbox.expand_coord(x0, y0, z0, m0);
            let (x1, y1, z1, m1) = read_coord(buf, offset + flags.ndims() * 8, flags)?;
            bbox.expand_coord(x1, y1, z1, m1);
            crate::bbox::widen_to_stored_precision(flags, &bbox)
        }
        _ => Err(GeometryCodecError::PeekNotDerivable),
    }
}

/// Read the first coordinate of a `Point` record without building a tree.
/// Errors with `EmptyPoint` if the point carries no coordinate.
pub fn peek_first_point(buf: &[u8]) -> Result<(f64, f64, Option<f64>, Option<f64>)> {
    let (flags, body_offset) = header(buf)?;
    let tag = read_u32(buf, body_offset)?;
    let kind = GeometryType::from_u32(tag)?;
    if kind != GeometryType::Point {
        return Err(GeometryCodecError::PeekNotDerivable);
    }
    let npoints = read_u32(buf, body_offset + 4)?;
    if npoints == 0 {
        return Err(GeometryCodecError::EmptyPoint);
    }
    read_coord(buf, body_offset + 8, flags)
}

/// Read the SRID without building a tree, for callers filtering by SRID
/// before deciding whether to decode at all.
pub fn peek_srid(buf: &[u8]) -> Result<crate::srid::Srid> {
    read_srid(buf, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::flags::Flags;
    use crate::geometry::{CoordSeq, Geometry, GeometryBody};
    use crate::policy::DefaultPolicy;
    use crate::srid::Srid;

    #[test]
    fn peeks_bbox_of_two_point_linestring_without_header_bbox() {
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
        let bbox = peek_bbox(&bytes).unwrap();
        assert_eq!(bbox.xmax, 1.0);
        assert_eq!(bbox.ymax, 2.0);
    }

    /// A policy that never stores a bbox, used to exercise `peek_bbox`'s
    /// derived-shape branches (spec §4.5.1), which `DefaultPolicy` can't
    /// reach since it attaches a bbox to every non-Point, non-empty shape.
    struct NoBboxPolicy;
    impl crate::policy::GeometryPolicy for NoBboxPolicy {
        fn calculate_bbox(&self, geom: &Geometry) -> Option<crate::bbox::Bbox> {
            DefaultPolicy.calculate_bbox(geom)
        }
        fn needs_bbox(&self, _geom: &Geometry) -> bool {
            false
        }
        fn allows_subtype(&self, parent: crate::geometry::GeometryType, child: crate::geometry::GeometryType) -> bool {
            DefaultPolicy.allows_subtype(parent, child)
        }
    }

    #[test]
    fn derives_bbox_of_bbox_less_two_point_linestring() {
        let flags = Flags::new(false, false, false);
        let line = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[(0.0, 0.0, None, None), (1.0, 2.0, None, None)],
            )),
        );
        let bytes = encode(&line, &NoBboxPolicy).unwrap();
        assert!(!Flags(bytes[7]).has_bbox());
        let bbox = peek_bbox(&bytes).unwrap();
        assert_eq!(bbox.xmax, 1.0);
        assert_eq!(bbox.ymax, 2.0);
    }

    #[test]
    fn three_point_linestring_is_not_peek_derivable() {
        let flags = Flags::new(false, false, false);
        let line = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[
                    (0.0, 0.0, None, None),
                    (1.0, 2.0, None, None),
                    (3.0, 4.0, None, None),
                ],
            )),
        );
        let bytes = encode(&line, &NoBboxPolicy).unwrap();
        assert!(matches!(
            peek_bbox(&bytes),
            Err(GeometryCodecError::PeekNotDerivable)
        ));
    }

    #[test]
    fn peeks_first_point() {
        let flags = Flags::new(false, false, false);
        let point = Geometry::new(
            Srid(4326),
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[(5.0, 6.0, None, None)])),
        );
        let bytes = encode(&point, &DefaultPolicy).unwrap();
        let (x, y, z, m) = peek_first_point(&bytes).unwrap();
        assert_eq!((x, y, z, m), (5.0, 6.0, None, None));
        assert_eq!(peek_srid(&bytes).unwrap(), Srid(4326));
    }

    #[test]
    fn empty_point_peek_errors() {
        let flags = Flags::new(false, false, false);
        let point = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[])),
        );
        let bytes = encode(&point, &DefaultPolicy).unwrap();
        assert!(matches!(
            peek_first_point(&bytes),
            Err(GeometryCodecError::EmptyPoint)
        ));
    }
}
