//! Core domain layer for the geomon change-detection engine.
//!
//! This crate holds everything the classifier, check registry, and run
//! orchestrator share:
//!
//! - **Identifiers** ([`id`]): UUID newtypes per record kind
//! - **Geometry payloads** ([`geometry`]): WKT parsing, normalization,
//!   canonical byte form, precomputed metadata
//! - **Fingerprinting** ([`fingerprint`]): geometry / attribute / composite
//!   SHA-256 digests, stable under attribute order and coordinate noise
//! - **Domain records** ([`model`]): datasets, snapshots, diffs, checks,
//!   and their aggregate views
//! - **Storage seam** ([`store`]): the `EngineStore` trait and the
//!   in-memory implementation used in tests and embedded deployments
//!
//! Nothing here is async; the engine crate layers orchestration on top.

pub mod error;
pub mod fingerprint;
pub mod geometry;
pub mod id;
pub mod model;
pub mod store;

pub use error::{CoreError, Result};
pub use fingerprint::{fingerprint_wkt, AttributeMap, Fingerprint};
pub use geometry::{
    canonical_bytes, normalize, parse_wkt, GeometryMetadata, GeometryType, NormalizeConfig,
};
pub use id::{CheckId, DatasetId, DiffId, SnapshotId};
pub use model::{
    CheckFilter, CheckResult, CheckResultCounts, CheckStats, Dataset, DatasetStats, DiffFilter,
    DiffStats, DiffType, GeometryDiff, GeometrySnapshot, Page, ReviewDecision, ReviewStatus,
    SourceFeature, SpatialCheck,
};
pub use store::{EngineStore, MemoryStore, RecordOutcome};
