//! Pluggable spatial quality checks for the geomon engine.
//!
//! A check is a pure function from a [`registry::CheckContext`] to a
//! [`registry::CheckOutcome`]; the [`registry::CheckRegistry`] runs every
//! registered check as a battery over one snapshot. Built-ins:
//!
//! - [`validity`]: self-intersections, degenerate rings, non-finite
//!   coordinates, escaped holes
//! - [`duplicate`]: byte-identical normalized geometry elsewhere in the
//!   dataset (warns)
//! - [`size`]: zero, near-zero, or out-of-distribution extents
//! - [`orientation`]: right-hand-rule ring winding
//!
//! Dataset-wide state (duplicate counts, extent baselines) lives in
//! [`context::DatasetContext`], built once per run by the orchestrator so
//! the checks themselves stay pure.

pub mod context;
pub mod duplicate;
pub mod orientation;
pub mod registry;
pub mod size;
pub mod validity;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::DatasetContext;
pub use duplicate::DuplicateCheck;
pub use orientation::RingOrientationCheck;
pub use registry::{CheckContext, CheckOutcome, CheckRegistry, QualityCheck};
pub use size::{SizeAnomalyCheck, SizeCheckConfig};
pub use validity::ValidityCheck;
