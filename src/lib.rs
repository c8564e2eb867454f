//! Zero-copy binary codec for spatial geometry trees.
//!
//! This crate translates between an in-memory `Geometry` tree and a
//! compact, tagged binary record modeled on PostGIS's `GSERIALIZED` wire
//! format: a fixed header (size, SRID, flags), an optional bounding box,
//! and a recursively tagged body. Decoding never copies coordinate data —
//! `Geometry`'s coordinate runs borrow directly from the input buffer.
//!
//! ## Round-tripping a geometry
//!
//! ```rust
//! use gserialized::{encode, decode, DefaultPolicy, Flags, Geometry, GeometryBody, CoordSeq, Srid};
//!
//! let flags = Flags::new(false, false, false);
//! let point = Geometry::new(
//!     Srid(4326),
//!     flags,
//!     GeometryBody::Point(CoordSeq::from_tuples(flags, &[(1.0, 2.0, None, None)])),
//! );
//! let bytes = encode(&point, &DefaultPolicy).unwrap();
//! let decoded = decode(&bytes, &DefaultPolicy).unwrap();
//! assert_eq!(decoded.srid, Srid(4326));
//! ```
//!
//! ## Peeking without a full decode
//!
//! ```rust
//! use gserialized::{encode, DefaultPolicy, Flags, Geometry, GeometryBody, CoordSeq, Srid, peek_first_point};
//!
//! let flags = Flags::new(false, false, false);
//! let point = Geometry::new(
//!     Srid::UNKNOWN,
//!     flags,
//!     GeometryBody::Point(CoordSeq::from_tuples(flags, &[(5.0, 6.0, None, None)])),
//! );
//! let bytes = encode(&point, &DefaultPolicy).unwrap();
//! let (x, y, _, _) = peek_first_point(&bytes).unwrap();
//! assert_eq!((x, y), (5.0, 6.0));
//! ```

pub mod bbox;
pub mod compare;
pub mod decode;
pub mod encode;
pub mod error;
pub mod flags;
pub mod geometry;
pub mod peek;
pub mod policy;
pub mod srid;

pub use bbox::Bbox;
pub use compare::compare;
pub use decode::decode;
pub use encode::{encode, size_of};
pub use error::{GeometryCodecError, Result};
pub use flags::{header_size, max_header_size, Flags};
pub use geometry::{CoordSeq, Geometry, GeometryBody, GeometryType};
pub use peek::{peek_bbox, peek_first_point, peek_srid};
pub use policy::{DefaultPolicy, GeometryPolicy};
pub use srid::Srid;
