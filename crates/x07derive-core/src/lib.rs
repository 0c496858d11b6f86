//! Type-directed derivation of comparison, hashing and tree serialization.
//!
//! The pipeline runs leaves first: [`shape`] describes type definitions,
//! [`group`] orders them into recursive groups, [`derive`] assembles the
//! combinators of each capability into generated functions, [`emit`] renders
//! them, and [`region`] checks or rewrites the marked regions of a host
//! document. [`runtime`] executes the generated functions in-process.

pub mod capability;
mod combinators;
pub mod derive;
pub mod diagnostics;
pub mod emit;
pub mod group;
pub mod input;
pub mod ir;
pub mod region;
pub mod runtime;
pub mod shape;
pub mod util;

pub use capability::{Capability, CapabilityEntry, CapabilityTable, ExternalDecl, FnKind, Origin};
pub use derive::{derive_request, BindingSet, Derivation, GeneratedUnit};
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Phase, Severity};
pub use group::{resolve_groups, DerivationGroup};
pub use input::TypesInput;
pub use region::{accept, check, AcceptOutcome, CheckReport, HostDocument, Mismatch, Region, RegionId};
pub use runtime::{EvalError, Runtime, Tree, Value};
pub use shape::{Ctor, DeriveRequest, Field, TypeDecl, TypeDef, TypeShape};
