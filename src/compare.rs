//! Total order over serialized records, grounded on `gserialized_cmp`,
//! `gbox_get_sortable_hash`, and `uint32_interleave_2` (original_source).
//! Meant for B-tree-style indexing: cheap, deterministic, not geometric
//! similarity.
//!
//! This is the "peek & compare" component (spec §2, §4.5): it deliberately
//! avoids the tree deserializer whenever the record shape lets it. Only the
//! slow path — reached when neither operand is a bare bbox-less point and no
//! bbox is stored and peek can't derive one — falls back to a full `decode`.

use std::cmp::Ordering;

use scroll::{Pread, BE};

use crate::bbox::Bbox;
use crate::decode::decode;
use crate::error::{GeometryCodecError, Result};
use crate::flags::Flags;
use crate::geometry::GeometryType;
use crate::peek::{header as peek_header, peek_bbox};
use crate::policy::{DefaultPolicy, GeometryPolicy};
use crate::srid::{read_srid, Srid};

/// Spread the bits of a 32-bit value so they occupy every other bit of a
/// 64-bit word (the standard 5-step Morton spread).
fn spread(mut n: u64) -> u64 {
    n &= 0xFFFFFFFF;
    n = (n | (n << 16)) & 0x0000FFFF0000FFFF;
    n = (n | (n << 8)) & 0x00FF00FF00FF00FF;
    n = (n | (n << 4)) & 0x0F0F0F0F0F0F0F0F;
    n = (n | (n << 2)) & 0x3333333333333333;
    n = (n | (n << 1)) & 0x5555555555555555;
    n
}

/// Interleave two 32-bit values into a single 64-bit Morton/Z-order code.
fn interleave(x: u32, y: u32) -> u64 {
    spread(x as u64) | (spread(y as u64) << 1)
}

/// Fast-path point hash: the `×2` sidesteps a divide-by-two in the
/// centroid-hash path this mirrors (spec §4.5.3 item 1, §9 design note); it
/// only changes the float's exponent, so sort order survives.
fn point_fast_hash(x: f64, y: f64) -> u64 {
    interleave(((2.0 * x) as f32).to_bits(), ((2.0 * y) as f32).to_bits())
}

/// The IEEE-754 bit pattern of the bbox centroid doubles as a sortable
/// integer for positive floats; this is exactly what the original
/// implementation relies on, negative-coordinate and antimeridian
/// wraparound quirks included.
///
/// Geodetic boxes store geocentric (X, Y, Z); the centroid of that box sits
/// strictly inside the sphere (spec §4.5.3 item 4: "normalize to the unit
/// sphere, convert to (longitude, latitude)"), so it is rescaled to unit
/// length before `atan2`/`asin` — matching `gbox_get_sortable_hash`'s own
/// `normalize(&p)` call ahead of `cart2geog` (original_source). A
/// degenerate all-zero centroid (antipodal points averaging to the origin)
/// falls back to the unnormalized point rather than dividing by zero; this
/// is the antimeridian-adjacent quirk spec.md §9 asks to preserve, not the
/// normalization step itself.
fn sortable_hash(bbox: &Bbox, geodetic: bool) -> u64 {
    if geodetic {
        let cx = (bbox.xmin + bbox.xmax) / 2.0;
        let cy = (bbox.ymin + bbox.ymax) / 2.0;
        let cz = (bbox.zmin + bbox.zmax) / 2.0;
        let norm = (cx * cx + cy * cy + cz * cz).sqrt();
        let (nx, ny, nz) = if norm > 0.0 {
            (cx / norm, cy / norm, (cz / norm).clamp(-1.0, 1.0))
        } else {
            (cx, cy, cz.clamp(-1.0, 1.0))
        };
        let lon = ny.atan2(nx);
        let lat = nz.asin();
        return interleave((lon as f32).to_bits(), (lat as f32).to_bits());
    }
    // Division by 2 is skipped: on a sortable bit pattern it would only
    // decrement the shared exponent, which `interleave` preserves anyway.
    let cx = (bbox.xmax + bbox.xmin) as f32;
    let cy = (bbox.ymax + bbox.ymin) as f32;
    interleave(cx.to_bits(), cy.to_bits())
}

/// Flags, SRID, and the offset of the tagged body, read directly off the
/// header without touching anything past it. Delegates the flags/offset part
/// to `peek::header` so the fast-path type-tag read below uses the exact
/// same header-skip routine `decode`/`peek_bbox` do (spec §9 open question).
fn read_header(buf: &[u8]) -> Result<(Flags, Srid, usize)> {
    let (flags, body_offset) = peek_header(buf)?;
    let srid = read_srid(buf, 4)?;
    Ok((flags, srid, body_offset))
}

/// A bounding box for `buf`, preferring the cheapest route available: a
/// stored box, then a peek-derived one, only falling back to a full decode +
/// calculation when the shape defeats peeking. `None` means the geometry is
/// empty (spec §4.5.3 item 2: "a record is considered empty iff
/// `get_bbox_or_compute` fails").
fn get_bbox_or_compute(buf: &[u8]) -> Option<Bbox> {
    match peek_bbox(buf) {
        Ok(bbox) => Some(bbox),
        Err(GeometryCodecError::PeekNotDerivable) => {
            let policy = DefaultPolicy;
            let geom = decode(buf, &policy).ok()?;
            policy.calculate_bbox(&geom)
        }
        Err(_) => None,
    }
}

/// A total order over two serialized records, suitable for sorting or
/// indexing. Not a spatial predicate: equal hashes do not mean equal shape,
/// only that the records sort adjacently.
pub fn compare(a: &[u8], b: &[u8]) -> Result<Ordering> {
    let (flags_a, srid_a, body_off_a) = read_header(a)?;
    let (flags_b, srid_b, body_off_b) = read_header(b)?;

    // Fast path (spec §4.5.3 item 1): two non-empty points, neither carrying
    // a bbox. `sz > 16` mirrors the original's "bigger than an empty record"
    // check without requiring a full body parse.
    if a.len() > 16 && b.len() > 16 && !flags_a.has_bbox() && !flags_b.has_bbox() {
        let tag_a: Result<u32> = a
            .pread_with(body_off_a, BE)
            .map_err(|_| GeometryCodecError::TruncatedRecord {
                offset: body_off_a,
                needed: 4,
                available: a.len().saturating_sub(body_off_a),
            });
        let tag_b: Result<u32> = b
            .pread_with(body_off_b, BE)
            .map_err(|_| GeometryCodecError::TruncatedRecord {
                offset: body_off_b,
                needed: 4,
                available: b.len().saturating_sub(body_off_b),
            });
        if tag_a.ok() == Some(GeometryType::Point as u32)
            && tag_b.ok() == Some(GeometryType::Point as u32)
            && srid_a == srid_b
        {
            let coords: Option<(f64, f64, f64, f64)> = (|| {
                Some((
                    a.pread_with::<f64>(body_off_a + 8, BE).ok()?,
                    a.pread_with::<f64>(body_off_a + 16, BE).ok()?,
                    b.pread_with::<f64>(body_off_b + 8, BE).ok()?,
                    b.pread_with::<f64>(body_off_b + 16, BE).ok()?,
                ))
            })();
            if let Some((xa, ya, xb, yb)) = coords {
                match point_fast_hash(xa, ya).cmp(&point_fast_hash(xb, yb)) {
                    Ordering::Equal => {}
                    other => return Ok(other),
                }
            }
        }
        // Hashes equal (or not both plain points): fall through to the slow path.
    }

    let bbox_a = get_bbox_or_compute(a);
    let bbox_b = get_bbox_or_compute(b);
    let a_empty = bbox_a.is_none();
    let b_empty = bbox_b.is_none();

    if a_empty && !b_empty {
        return Ok(Ordering::Less);
    }
    if !a_empty && b_empty {
        return Ok(Ordering::Greater);
    }

    let body_a = &a[body_off_a..];
    let body_b = &b[body_off_b..];
    let bsz_a = body_a.len();
    let bsz_b = body_b.len();
    let bsz = bsz_a.min(bsz_b);
    let body_cmp = body_a[..bsz].cmp(&body_b[..bsz]);

    // Exact equality: only perfect equality short-circuits to zero.
    if bsz_a == bsz_b && srid_a == srid_b && body_cmp == Ordering::Equal {
        return Ok(Ordering::Equal);
    }

    if !a_empty && !b_empty {
        let bbox_a = bbox_a.expect("checked non-empty above");
        let bbox_b = bbox_b.expect("checked non-empty above");
        match sortable_hash(&bbox_a, flags_a.is_geodetic())
            .cmp(&sortable_hash(&bbox_b, flags_b.is_geodetic()))
        {
            Ordering::Equal => {}
            other => return Ok(other),
        }
        for (pa, pb) in [
            (bbox_a.xmin, bbox_b.xmin),
            (bbox_a.ymin, bbox_b.ymin),
            (bbox_a.xmax, bbox_b.xmax),
            (bbox_a.ymax, bbox_b.ymax),
        ] {
            if let Some(ord @ (Ordering::Less | Ordering::Greater)) = pa.partial_cmp(&pb) {
                return Ok(ord);
            }
        }
    }

    // Prefix comes before the longer record it's a prefix of.
    if bsz_a != bsz_b && body_cmp == Ordering::Equal {
        return Ok(if bsz_a < bsz_b {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    // Equal-length, equal-prefix bodies that reached here differ only by
    // SRID (spec §8 scenario 5, "body-then-SRID ordering"): line 169 already
    // ruled out srid_a == srid_b for an equal body, so this is a genuine tie
    // to break, not an arbitrary direction.
    Ok(match body_cmp {
        Ordering::Equal => srid_a.cmp(&srid_b),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::flags::Flags;
    use crate::geometry::{CoordSeq, Geometry, GeometryBody};
    use crate::srid::Srid;

    fn point(srid: Srid, x: f64, y: f64) -> Vec<u8> {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(
            srid,
            flags,
            GeometryBody::Point(CoordSeq::from_tuples(flags, &[(x, y, None, None)])),
        );
        encode(&geom, &DefaultPolicy).unwrap()
    }

    fn empty_multipoint() -> Vec<u8> {
        let flags = Flags::new(false, false, false);
        let geom = Geometry::new(Srid::UNKNOWN, flags, GeometryBody::MultiPoint(vec![]));
        encode(&geom, &DefaultPolicy).unwrap()
    }

    #[test]
    fn identical_coordinates_different_srid_compare_nonzero_and_deterministic() {
        let a = point(Srid(4326), 1.0, 2.0);
        let b = point(Srid(3857), 1.0, 2.0);
        let first = compare(&a, &b).unwrap();
        assert_ne!(first, Ordering::Equal);
        assert_eq!(compare(&a, &b).unwrap(), first);
    }

    #[test]
    fn empty_sorts_before_non_empty() {
        let empty = empty_multipoint();
        let full = point(Srid::UNKNOWN, 0.0, 0.0);
        assert_eq!(compare(&empty, &full).unwrap(), Ordering::Less);
    }

    #[test]
    fn identical_records_compare_equal() {
        let a = point(Srid(4326), 1.0, 2.0);
        let b = point(Srid(4326), 1.0, 2.0);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Equal);
    }

    #[test]
    fn reflexive_for_every_record() {
        let recs = [point(Srid(4326), 1.0, 2.0), empty_multipoint(), point(Srid::UNKNOWN, -3.0, 9.0)];
        for r in &recs {
            assert_eq!(compare(r, r).unwrap(), Ordering::Equal);
        }
    }

    #[test]
    fn antisymmetric() {
        let a = point(Srid::UNKNOWN, 1.0, 2.0);
        let b = point(Srid::UNKNOWN, 5.0, 6.0);
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        assert_eq!(ab, ba.reverse());
    }

    #[test]
    fn is_transitive_on_a_small_sorted_sample() {
        // Non-negative coordinates only: the sortable hash reuses the raw
        // IEEE-754 bit pattern of the centroid, which is monotonic with
        // value only on the positive side (see the geodetic caveat above).
        let mut records = vec![
            point(Srid::UNKNOWN, 0.0, 0.0),
            point(Srid::UNKNOWN, 2.0, 2.0),
            point(Srid::UNKNOWN, 5.0, 5.0),
        ];
        records.sort_by(|a, b| compare(a, b).unwrap());
        assert_eq!(compare(&records[0], &records[1]).unwrap(), Ordering::Less);
        assert_eq!(compare(&records[1], &records[2]).unwrap(), Ordering::Less);
    }

    #[test]
    fn fast_path_agrees_with_slow_path() {
        // Two bbox-less points with the same SRID take the fast path; the
        // result must match what a forced-bbox encoding of the same points
        // would produce through the slow centroid-hash path.
        let a = point(Srid(4326), 10.0, 20.0);
        let b = point(Srid(4326), 30.0, 40.0);
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(compare(&b, &a).unwrap(), Ordering::Greater);
    }

    #[test]
    fn geodetic_records_compare_by_geocentric_centroid() {
        let flags = Flags::new(false, false, true);
        let line_at_origin = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[(-1.0, 0.0, None, None), (1.0, 0.0, None, None)],
            )),
        );
        let line_near_pole = Geometry::new(
            Srid::UNKNOWN,
            flags,
            GeometryBody::LineString(CoordSeq::from_tuples(
                flags,
                &[(0.0, 89.0, None, None), (0.0, 89.5, None, None)],
            )),
        );
        let a = encode(&line_at_origin, &DefaultPolicy).unwrap();
        let b = encode(&line_near_pole, &DefaultPolicy).unwrap();
        assert_ne!(compare(&a, &b).unwrap(), Ordering::Equal);
        assert_eq!(compare(&a, &a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn truncated_record_errors() {
        let buf = [0u8; 4];
        assert!(compare(&buf, &buf).is_err());
    }

    #[test]
    fn same_body_different_srid_is_antisymmetric() {
        // Byte-identical bodies, different SRIDs: every hash and bbox
        // tie-break is equal, so the final fallthrough must still reverse
        // correctly rather than collapsing to a fixed direction.
        let a = point(Srid(4326), 0.0, 0.0);
        let b = point(Srid(3857), 0.0, 0.0);
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        assert_ne!(ab, Ordering::Equal);
        assert_eq!(ab, ba.reverse());
    }
}
