//! Bounding box: in-memory f64 box, directed-rounding f32 wire encoding, and
//! (de)serialization sized by the active dimensionality.
//!
//! Grounded on `gserialized_from_gbox`/`gserialized_read_gbox_p`
//! (original_source/liblwgeom/g_serialized.c): the box is stored as pairs of
//! `min, max` floats, one pair per active ordinate, ordered x, y, z, m. Mins
//! round toward negative infinity and maxes toward positive infinity so the
//! stored box always contains the true extent, even after the f64 -> f32
//! narrowing.

use scroll::{Pread, Pwrite, BE};

use crate::error::{GeometryCodecError, Result};
use crate::flags::Flags;

/// An axis-aligned box over up to four ordinates (x, y, z, m). Unused
/// ordinates (no Z / no M on the owning geometry) are left at their default
/// and never written to the wire.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Bbox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
    pub mmin: f64,
    pub mmax: f64,
}

impl Default for Bbox {
    fn default() -> Bbox {
        Bbox {
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
            zmin: f64::INFINITY,
            zmax: f64::NEG_INFINITY,
            mmin: f64::INFINITY,
            mmax: f64::NEG_INFINITY,
        }
    }
}

impl Bbox {
    pub fn new_xy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Bbox {
        Bbox {
            xmin,
            xmax,
            ymin,
            ymax,
            ..Bbox::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Bbox::default();
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn expand(&mut self, other: &Bbox) {
        self.xmin = self.xmin.min(other.xmin);
        self.ymin = self.ymin.min(other.ymin);
        self.zmin = self.zmin.min(other.zmin);
        self.mmin = self.mmin.min(other.mmin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymax = self.ymax.max(other.ymax);
        self.zmax = self.zmax.max(other.zmax);
        self.mmax = self.mmax.max(other.mmax);
    }

    pub fn expand_coord(&mut self, x: f64, y: f64, z: Option<f64>, m: Option<f64>) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
        if let Some(z) = z {
            self.zmin = self.zmin.min(z);
            self.zmax = self.zmax.max(z);
        }
        if let Some(m) = m {
            self.mmin = self.mmin.min(m);
            self.mmax = self.mmax.max(m);
        }
    }

    pub fn intersects(&self, other: &Bbox) -> bool {
        !(self.xmax < other.xmin
            || other.xmax < self.xmin
            || self.ymax < other.ymin
            || other.ymax < self.ymin)
    }

    /// Does this box contain `other` (every ordinate, not just x/y)?
    pub fn contains(&self, other: &Bbox) -> bool {
        self.xmin <= other.xmin
            && self.xmax >= other.xmax
            && self.ymin <= other.ymin
            && self.ymax >= other.ymax
    }
}

/// `2 floats per active ordinate * 4 bytes`, spec §4.2. Geodetic boxes are
/// always `xmin xmax ymin ymax zmin zmax` (geocentric Z) regardless of the
/// Z/M flags — 24 bytes flat, M ignored.
pub fn bbox_size(flags: Flags) -> usize {
    if flags.is_geodetic() {
        return 6 * std::mem::size_of::<f32>();
    }
    2 * flags.ndims() * std::mem::size_of::<f32>()
}

/// Project a geodetic (longitude, latitude) coordinate, in degrees, onto the
/// unit sphere as geocentric (X, Y, Z). Grounded on `ll2cart`
/// (original_source/liblwgeom/lwgeodetic.c): this is the "geometric algebra"
/// spec.md §1 treats as an external pure function, but the geodetic bbox
/// layout of §3.3 can't be exercised without it, so `DefaultPolicy` carries
/// this one conversion in-crate rather than leaving geodetic boxes
/// unimplemented.
pub fn geodetic_to_geocentric(lon_deg: f64, lat_deg: f64) -> (f64, f64, f64) {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    (cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Round `d` down to the nearest `f32` that is `<= d`.
pub fn next_float_down(d: f64) -> f32 {
    if !d.is_finite() {
        return d as f32;
    }
    let f = d as f32;
    if (f as f64) <= d {
        f
    } else {
        step_f32(f, -1)
    }
}

/// Round `d` up to the nearest `f32` that is `>= d`.
pub fn next_float_up(d: f64) -> f32 {
    if !d.is_finite() {
        return d as f32;
    }
    let f = d as f32;
    if (f as f64) >= d {
        f
    } else {
        step_f32(f, 1)
    }
}

fn step_f32(f: f32, dir: i32) -> f32 {
    if f == 0.0 {
        return if dir > 0 {
            f32::from_bits(1)
        } else {
            -f32::from_bits(1)
        };
    }
    let bits = f.to_bits() as i32;
    let bits = if f > 0.0 { bits + dir } else { bits - dir };
    f32::from_bits(bits as u32)
}

/// Write the box's active ordinate pairs (x, y, [z], [m]) as directed-rounded
/// `f32`s, big-endian, starting at `offset`.
pub fn write_bbox(buf: &mut [u8], offset: usize, flags: Flags, bbox: &Bbox) -> Result<()> {
    let size = bbox_size(flags);
    if buf.len() < offset + size {
        return Err(GeometryCodecError::TruncatedRecord {
            offset,
            needed: size,
            available: buf.len().saturating_sub(offset),
        });
    }
    let mut cursor = offset;
    let mut put = |buf: &mut [u8], value: f32| -> Result<()> {
        buf.gwrite_with(value, &mut cursor, BE)
            .map(|_| ())
            .map_err(|_| GeometryCodecError::TruncatedRecord {
                offset: cursor,
                needed: 4,
                available: buf.len().saturating_sub(cursor),
            })
    };
    put(buf, next_float_down(bbox.xmin))?;
    put(buf, next_float_up(bbox.xmax))?;
    put(buf, next_float_down(bbox.ymin))?;
    put(buf, next_float_up(bbox.ymax))?;
    if flags.is_geodetic() {
        // Geocentric Z always rides along; the M bit is ignored (spec §3.3).
        put(buf, next_float_down(bbox.zmin))?;
        put(buf, next_float_up(bbox.zmax))?;
        return Ok(());
    }
    if flags.has_z() {
        put(buf, next_float_down(bbox.zmin))?;
        put(buf, next_float_up(bbox.zmax))?;
    }
    if flags.has_m() {
        put(buf, next_float_down(bbox.mmin))?;
        put(buf, next_float_up(bbox.mmax))?;
    }
    Ok(())
}

/// Round-trip `bbox` through the wire's directed-rounded `f32` encoding
/// without actually touching a record. `peek_bbox`'s derived shapes (spec
/// §4.5.1) need this so a box built straight from a couple of exact `f64`
/// coordinates is byte-comparable with a box read out of a record's header.
pub fn widen_to_stored_precision(flags: Flags, bbox: &Bbox) -> Result<Bbox> {
    let mut buf = vec![0u8; bbox_size(flags)];
    write_bbox(&mut buf, 0, flags, bbox)?;
    read_bbox(&buf, 0, flags)
}

/// Read the box written by `write_bbox`, widening the `f32`s back to `f64`.
pub fn read_bbox(buf: &[u8], offset: usize, flags: Flags) -> Result<Bbox> {
    let size = bbox_size(flags);
    if buf.len() < offset + size {
        return Err(GeometryCodecError::TruncatedRecord {
            offset,
            needed: size,
            available: buf.len().saturating_sub(offset),
        });
    }
    let mut cursor = offset;
    let mut get = |buf: &[u8]| -> Result<f64> {
        buf.gread_with::<f32>(&mut cursor, BE)
            .map(|v| v as f64)
            .map_err(|_| GeometryCodecError::TruncatedRecord {
                offset: cursor,
                needed: 4,
                available: buf.len().saturating_sub(cursor),
            })
    };
    let xmin = get(buf)?;
    let xmax = get(buf)?;
    let ymin = get(buf)?;
    let ymax = get(buf)?;
    let mut bbox = Bbox {
        xmin,
        xmax,
        ymin,
        ymax,
        ..Bbox::default()
    };
    if flags.is_geodetic() {
        bbox.zmin = get(buf)?;
        bbox.zmax = get(buf)?;
        return Ok(bbox);
    }
    if flags.has_z() {
        bbox.zmin = get(buf)?;
        bbox.zmax = get(buf)?;
    }
    if flags.has_m() {
        bbox.mmin = get(buf)?;
        bbox.mmax = get(buf)?;
    }
    Ok(bbox)
}
