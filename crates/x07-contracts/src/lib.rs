//! Shared, version-pinned protocol identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in the machine-readable inputs and reports of `x07derive`. Inputs carrying
//! a different `schema_version` are rejected rather than guessed at.

pub const X07DERIVE_TYPES_SCHEMA_VERSION: &str = "x07derive.types@0.1.0";
pub const X07DERIVE_MANIFEST_SCHEMA_VERSION: &str = "x07derive.manifest@0.1.0";

pub const X07DERIVE_REPORT_SCHEMA_VERSION: &str = "x07derive.report@0.1.0";
pub const X07DERIVE_BATCH_REPORT_SCHEMA_VERSION: &str = "x07derive.batch.report@0.1.0";
pub const X07DERIVE_GROUPS_REPORT_SCHEMA_VERSION: &str = "x07derive.groups.report@0.1.0";

/// Marker keyword used in host documents unless a caller overrides it
/// (`@derive:begin <type> <capability>` / `@derive:end <type> <capability>`).
pub const DEFAULT_REGION_MARKER: &str = "derive";
