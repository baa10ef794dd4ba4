//! Content fingerprinting for geometries and their attributes.
//!
//! A fingerprint is three lowercase-hex SHA-256 digests: one over the
//! geometry's normalized coordinate structure, one over the attribute map,
//! and a composite over both. The sub-digests let the change classifier tell
//! geometry edits from attribute edits without re-diffing payloads.
//!
//! Stability guarantees:
//! - permuting attribute insertion order never changes any digest,
//! - coordinate formatting noise below the configured precision never
//!   changes the geometry digest,
//! - an unclosed polygon ring and its closed form hash identically.

use crate::error::Result;
use crate::geometry::{canonical_bytes, normalize, parse_wkt, GeometryMetadata, NormalizeConfig};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Attribute mapping for one source row. Keyed deterministically; insertion
/// order is irrelevant by construction.
pub type AttributeMap = BTreeMap<String, serde_json::Value>;

/// Content fingerprint of one geometry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Digest of the normalized coordinate structure.
    pub geometry: String,

    /// Digest of the attribute map.
    pub attributes: String,

    /// Digest combining both; the change-detection key.
    pub composite: String,
}

fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash a geometry's normalized coordinate structure.
pub fn geometry_digest(geom: &Geometry<f64>, config: &NormalizeConfig) -> String {
    hex_digest(&canonical_bytes(&normalize(geom, config)))
}

/// Hash an attribute map in sorted key order.
///
/// Values are serialized as compact JSON, so `1` and `1.0` hash differently
/// (they are different source values) while map key order never matters.
pub fn attribute_digest(attributes: &AttributeMap) -> String {
    let mut hasher = Sha256::new();
    for (i, (key, value)) in attributes.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        // serde_json::Value -> String cannot fail.
        hasher.update(value.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Compose the geometry and attribute digests into the change-detection key.
pub fn composite_digest(geometry: &str, attributes: &str) -> String {
    hex_digest(format!("geom:{geometry}|attrs:{attributes}").as_bytes())
}

impl Fingerprint {
    /// Fingerprint an already-parsed geometry and its attributes.
    pub fn compute(
        geom: &Geometry<f64>,
        attributes: &AttributeMap,
        config: &NormalizeConfig,
    ) -> Self {
        let geometry = geometry_digest(geom, config);
        let attributes = attribute_digest(attributes);
        let composite = composite_digest(&geometry, &attributes);
        Self {
            geometry,
            attributes,
            composite,
        }
    }
}

/// Parse, fingerprint, and measure one source payload.
///
/// The single entry point the classifier uses per source row; fails only on
/// unparseable WKT.
pub fn fingerprint_wkt(
    wkt: &str,
    attributes: &AttributeMap,
    config: &NormalizeConfig,
) -> Result<(Fingerprint, GeometryMetadata)> {
    let geom = parse_wkt(wkt)?;
    let fingerprint = Fingerprint::compute(&geom, attributes, config);
    let metadata = GeometryMetadata::compute(&geom);
    Ok((fingerprint, metadata))
}
