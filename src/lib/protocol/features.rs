use std::fmt::Display;

use log::{debug, warn};

use super::{ProtocolError, Result};

pub const FEATURE_VECTOR: u8 = 1;
pub const FEATURE_INTERSECTION: u8 = 2;
pub const FEATURE_BARCODE: u8 = 4;
/// Feature mask requesting vectors, intersections and barcodes.
pub const FEATURES_ALL: u8 = FEATURE_VECTOR | FEATURE_INTERSECTION | FEATURE_BARCODE;

pub const VECTOR_SIZE: usize = 6;
pub const BARCODE_SIZE: usize = 4;
pub const BRANCH_SIZE: usize = 4;
const INTERSECTION_PREFIX_SIZE: usize = 3;
const RECORD_PREFIX_SIZE: usize = 2;

pub const LINE_FLAG_INTERSECTION_PRESENT: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector {
    pub x0: u8,
    pub y0: u8,
    pub x1: u8,
    pub y1: u8,
    pub index: u8,
    pub flags: u8,
}

impl Vector {
    pub fn has_intersection(&self) -> bool {
        self.flags & LINE_FLAG_INTERSECTION_PRESENT != 0
    }
}

impl Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vector {}: ({}, {}) -> ({}, {}) flags={:#04x}",
            self.index, self.x0, self.y0, self.x1, self.y1, self.flags
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Branch {
    pub index: u8,
    pub angle_byte1: u8,
    pub angle_byte2: u8,
}

impl Branch {
    /// Branch direction in degrees, signed 16-bit little-endian on the wire.
    pub fn angle(&self) -> i16 {
        i16::from_le_bytes([self.angle_byte1, self.angle_byte2])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intersection {
    pub x: u8,
    pub y: u8,
    pub branches: Vec<Branch>,
}

impl Display for Intersection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "intersection: ({}, {}) branches=[", self.x, self.y)?;
        for (i, b) in self.branches.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}@{}", b.index, b.angle())?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Barcode {
    pub x: u8,
    pub y: u8,
    pub flags: u8,
    pub code: u8,
}

impl Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "barcode {}: ({}, {}) flags={:#04x}",
            self.code, self.x, self.y, self.flags
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    Vector(Vector),
    Intersection(Intersection),
    Barcode(Barcode),
}

/// Record the parser skipped without failing the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureAnomaly {
    UnknownFeatureType { feature_type: u8, length: u8 },
}

/// One line tracking snapshot, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineFeatures {
    features: Vec<Feature>,
    anomalies: Vec<FeatureAnomaly>,
    num_vectors: usize,
    num_intersections: usize,
    num_barcodes: usize,
}

impl LineFeatures {
    pub fn new(features: Vec<Feature>, anomalies: Vec<FeatureAnomaly>) -> Self {
        let (mut num_vectors, mut num_intersections, mut num_barcodes) = (0, 0, 0);
        for feature in &features {
            match feature {
                Feature::Vector(_) => num_vectors += 1,
                Feature::Intersection(_) => num_intersections += 1,
                Feature::Barcode(_) => num_barcodes += 1,
            }
        }

        LineFeatures {
            features,
            anomalies,
            num_vectors,
            num_intersections,
            num_barcodes,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn anomalies(&self) -> &[FeatureAnomaly] {
        &self.anomalies
    }

    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    pub fn num_intersections(&self) -> usize {
        self.num_intersections
    }

    pub fn num_barcodes(&self) -> usize {
        self.num_barcodes
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn vectors(&self) -> impl Iterator<Item = &Vector> {
        self.features.iter().filter_map(|f| match f {
            Feature::Vector(v) => Some(v),
            _ => None,
        })
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.features.iter().filter_map(|f| match f {
            Feature::Intersection(i) => Some(i),
            _ => None,
        })
    }

    pub fn barcodes(&self) -> impl Iterator<Item = &Barcode> {
        self.features.iter().filter_map(|f| match f {
            Feature::Barcode(b) => Some(b),
            _ => None,
        })
    }
}

impl Display for LineFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vectors, {} intersections, {} barcodes",
            self.num_vectors, self.num_intersections, self.num_barcodes
        )?;
        for feature in &self.features {
            match feature {
                Feature::Vector(v) => write!(f, "\n{}", v)?,
                Feature::Intersection(i) => write!(f, "\n{}", i)?,
                Feature::Barcode(b) => write!(f, "\n{}", b)?,
            }
        }
        for FeatureAnomaly::UnknownFeatureType {
            feature_type,
            length,
        } in &self.anomalies
        {
            write!(f, "\nskipped feature type {} ({} bytes)", feature_type, length)?;
        }
        Ok(())
    }
}

/// Parses a line tracking payload of `length` bytes.
///
/// `read(n)` must yield exactly `n` bytes of the payload. Records are read one
/// at a time and nothing is read past `length`: a record that would overrun it
/// fails with [`ProtocolError::TruncatedFeatureStream`] before its body is
/// requested. Unknown record types are skipped and recorded as anomalies.
pub fn parse_feature_stream<R>(length: usize, mut read: R) -> Result<LineFeatures>
where
    R: FnMut(usize) -> Result<Vec<u8>>,
{
    let mut features = Vec::new();
    let mut anomalies = Vec::new();
    let mut consumed = 0usize;

    while consumed < length {
        let remaining = length - consumed;
        if remaining < RECORD_PREFIX_SIZE {
            return Err(ProtocolError::TruncatedFeatureStream {
                needed: RECORD_PREFIX_SIZE,
                remaining,
            }
            .into());
        }

        let prefix = read(RECORD_PREFIX_SIZE)?;
        let (feature_type, feature_length) = (prefix[0], prefix[1]);
        let needed = RECORD_PREFIX_SIZE + feature_length as usize;

        if needed > remaining {
            return Err(ProtocolError::TruncatedFeatureStream { needed, remaining }.into());
        }

        let body = read(feature_length as usize)?;
        debug!("feature type {} body {:02X?}", feature_type, body);

        match feature_type {
            FEATURE_VECTOR => features.extend(decode_vectors(&body)?),
            FEATURE_INTERSECTION => features.extend(decode_intersections(&body)?),
            FEATURE_BARCODE => features.extend(decode_barcodes(&body)?),
            _ => {
                warn!(
                    "skipping unknown feature type {} ({} bytes)",
                    feature_type, feature_length
                );
                anomalies.push(FeatureAnomaly::UnknownFeatureType {
                    feature_type,
                    length: feature_length,
                });
            }
        }

        consumed += needed;
    }

    Ok(LineFeatures::new(features, anomalies))
}

fn malformed(feature_type: u8, body: &[u8]) -> ProtocolError {
    ProtocolError::MalformedFeature {
        feature_type,
        length: body.len(),
    }
}

fn decode_vectors(body: &[u8]) -> Result<Vec<Feature>> {
    if body.is_empty() || body.len() % VECTOR_SIZE != 0 {
        return Err(malformed(FEATURE_VECTOR, body).into());
    }

    Ok(body
        .chunks_exact(VECTOR_SIZE)
        .map(|d| {
            Feature::Vector(Vector {
                x0: d[0],
                y0: d[1],
                x1: d[2],
                y1: d[3],
                index: d[4],
                flags: d[5],
            })
        })
        .collect())
}

fn decode_intersections(body: &[u8]) -> Result<Vec<Feature>> {
    if body.is_empty() {
        return Err(malformed(FEATURE_INTERSECTION, body).into());
    }

    let mut result = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        if rest.len() < INTERSECTION_PREFIX_SIZE {
            return Err(malformed(FEATURE_INTERSECTION, body).into());
        }

        let num_branches = rest[2] as usize;
        let size = INTERSECTION_PREFIX_SIZE + num_branches * BRANCH_SIZE;
        if rest.len() < size {
            return Err(malformed(FEATURE_INTERSECTION, body).into());
        }

        let branches = rest[INTERSECTION_PREFIX_SIZE..size]
            .chunks_exact(BRANCH_SIZE)
            .map(|d| Branch {
                index: d[0],
                angle_byte1: d[2],
                angle_byte2: d[3],
            })
            .collect();

        result.push(Feature::Intersection(Intersection {
            x: rest[0],
            y: rest[1],
            branches,
        }));
        rest = &rest[size..];
    }

    Ok(result)
}

fn decode_barcodes(body: &[u8]) -> Result<Vec<Feature>> {
    if body.is_empty() || body.len() % BARCODE_SIZE != 0 {
        return Err(malformed(FEATURE_BARCODE, body).into());
    }

    Ok(body
        .chunks_exact(BARCODE_SIZE)
        .map(|d| {
            Feature::Barcode(Barcode {
                x: d[0],
                y: d[1],
                flags: d[2],
                code: d[3],
            })
        })
        .collect())
}
