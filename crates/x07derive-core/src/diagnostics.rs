use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Parse,
    Shape,
    Derive,
    Region,
    Internal,
}

/// Closed catalog of everything `x07derive` can report.
///
/// The `X7D01xx` block is the shape-error family (fatal for the whole request),
/// `X7D02xx`/`X7D03xx` are per-(type, capability) derivation failures that are
/// collected, and `X7D04xx` are host-document findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    X7D0001ParseError,
    X7D0002SchemaVersion,
    X7D0100InvalidIdent,
    X7D0101DuplicateTypeParam,
    X7D0102UnboundTypeVar,
    X7D0103DuplicateField,
    X7D0104DuplicateCtor,
    X7D0105DuplicateTypeName,
    X7D0106DanglingRecursive,
    X7D0107ArityMismatch,
    X7D0108ShadowsTableEntry,
    X7D0200UnsupportedShape,
    X7D0300UnresolvedCapability,
    X7D0400RegionMismatch,
    X7D0401RegionMalformed,
    X7D0402RegionUnknownType,
    X7D0403RegionDuplicate,
    X7D0404RegionUnavailable,
    X7D0901InternalBug,
}

impl DiagnosticCode {
    pub fn code_str(self) -> &'static str {
        match self {
            DiagnosticCode::X7D0001ParseError => "X7D0001",
            DiagnosticCode::X7D0002SchemaVersion => "X7D0002",
            DiagnosticCode::X7D0100InvalidIdent => "X7D0100",
            DiagnosticCode::X7D0101DuplicateTypeParam => "X7D0101",
            DiagnosticCode::X7D0102UnboundTypeVar => "X7D0102",
            DiagnosticCode::X7D0103DuplicateField => "X7D0103",
            DiagnosticCode::X7D0104DuplicateCtor => "X7D0104",
            DiagnosticCode::X7D0105DuplicateTypeName => "X7D0105",
            DiagnosticCode::X7D0106DanglingRecursive => "X7D0106",
            DiagnosticCode::X7D0107ArityMismatch => "X7D0107",
            DiagnosticCode::X7D0108ShadowsTableEntry => "X7D0108",
            DiagnosticCode::X7D0200UnsupportedShape => "X7D0200",
            DiagnosticCode::X7D0300UnresolvedCapability => "X7D0300",
            DiagnosticCode::X7D0400RegionMismatch => "X7D0400",
            DiagnosticCode::X7D0401RegionMalformed => "X7D0401",
            DiagnosticCode::X7D0402RegionUnknownType => "X7D0402",
            DiagnosticCode::X7D0403RegionDuplicate => "X7D0403",
            DiagnosticCode::X7D0404RegionUnavailable => "X7D0404",
            DiagnosticCode::X7D0901InternalBug => "X7D0901",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            DiagnosticCode::X7D0001ParseError => "failed to parse input",
            DiagnosticCode::X7D0002SchemaVersion => "unsupported schema_version",
            DiagnosticCode::X7D0100InvalidIdent => "invalid identifier",
            DiagnosticCode::X7D0101DuplicateTypeParam => "duplicate type parameter",
            DiagnosticCode::X7D0102UnboundTypeVar => "unbound type variable",
            DiagnosticCode::X7D0103DuplicateField => "duplicate record field",
            DiagnosticCode::X7D0104DuplicateCtor => "duplicate variant constructor",
            DiagnosticCode::X7D0105DuplicateTypeName => "duplicate type definition",
            DiagnosticCode::X7D0106DanglingRecursive => "recursive reference to an unknown type",
            DiagnosticCode::X7D0107ArityMismatch => "type applied with the wrong number of arguments",
            DiagnosticCode::X7D0108ShadowsTableEntry => "type name is already provided by the capability table",
            DiagnosticCode::X7D0200UnsupportedShape => "no combinator rule for shape",
            DiagnosticCode::X7D0300UnresolvedCapability => "required capability is not available",
            DiagnosticCode::X7D0400RegionMismatch => "generated region is out of date",
            DiagnosticCode::X7D0401RegionMalformed => "malformed region markers",
            DiagnosticCode::X7D0402RegionUnknownType => "region names a type outside the request",
            DiagnosticCode::X7D0403RegionDuplicate => "binding set is claimed by more than one region",
            DiagnosticCode::X7D0404RegionUnavailable => "region's binding set failed to derive",
            DiagnosticCode::X7D0901InternalBug => "internal x07derive bug",
        }
    }

    pub fn default_help(self) -> Option<&'static str> {
        match self {
            DiagnosticCode::X7D0002SchemaVersion => {
                Some("Regenerate the input with a front end that targets this x07derive version.")
            }
            DiagnosticCode::X7D0106DanglingRecursive => Some(
                "Recursive references must name a type of the same request; use an applied type for external types.",
            ),
            DiagnosticCode::X7D0108ShadowsTableEntry => {
                Some("Rename the type; primitives, containers and externals keep their names.")
            }
            DiagnosticCode::X7D0200UnsupportedShape => Some(
                "Remove the capability from the request or change the field type; there is no fallback ordering.",
            ),
            DiagnosticCode::X7D0300UnresolvedCapability => Some(
                "Derive the capability for the referenced type first, or register it as an external with that capability.",
            ),
            DiagnosticCode::X7D0400RegionMismatch => {
                Some("Run `x07derive gen` without --check to accept the regenerated text.")
            }
            DiagnosticCode::X7D0403RegionDuplicate => {
                Some("Members of a recursive group share one region per capability.")
            }
            DiagnosticCode::X7D0901InternalBug => Some(
                "This is a bug in x07derive. Please report it with the type input and document.",
            ),
            _ => None,
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            DiagnosticCode::X7D0001ParseError | DiagnosticCode::X7D0002SchemaVersion => {
                Phase::Parse
            }
            DiagnosticCode::X7D0100InvalidIdent
            | DiagnosticCode::X7D0101DuplicateTypeParam
            | DiagnosticCode::X7D0102UnboundTypeVar
            | DiagnosticCode::X7D0103DuplicateField
            | DiagnosticCode::X7D0104DuplicateCtor
            | DiagnosticCode::X7D0105DuplicateTypeName
            | DiagnosticCode::X7D0106DanglingRecursive
            | DiagnosticCode::X7D0107ArityMismatch
            | DiagnosticCode::X7D0108ShadowsTableEntry => Phase::Shape,
            DiagnosticCode::X7D0200UnsupportedShape
            | DiagnosticCode::X7D0300UnresolvedCapability => Phase::Derive,
            DiagnosticCode::X7D0400RegionMismatch
            | DiagnosticCode::X7D0401RegionMalformed
            | DiagnosticCode::X7D0402RegionUnknownType
            | DiagnosticCode::X7D0403RegionDuplicate
            | DiagnosticCode::X7D0404RegionUnavailable => Phase::Region,
            DiagnosticCode::X7D0901InternalBug => Phase::Internal,
        }
    }

    pub fn is_shape_error(self) -> bool {
        self.phase() == Phase::Shape
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub phase: Phase,
    pub severity: Severity,
    /// The type definition the finding is about, when there is one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_name: Option<String>,
    pub message: String,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            phase: code.phase(),
            severity: Severity::Error,
            type_name: None,
            message: message.into(),
            help: code.default_help().map(|s| s.to_string()),
        }
    }

    pub fn for_type(code: DiagnosticCode, type_name: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            type_name: Some(type_name.to_string()),
            ..Diagnostic::error(code, message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {:?}: ",
            self.code.code_str(),
            self.phase,
            self.severity,
        )?;
        if let Some(ty) = &self.type_name {
            write!(f, "[{ty}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// A non-empty batch of diagnostics returned as one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.0.iter().map(|d| d.code).collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, d) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

pub fn render_diagnostics_md() -> String {
    let mut rows: Vec<(String, Phase, String, String)> = Vec::new();
    for code in all_codes() {
        rows.push((
            code.code_str().to_string(),
            code.phase(),
            code.default_message().to_string(),
            code.default_help().unwrap_or("").to_string(),
        ));
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    out.push_str("# x07derive diagnostics catalog\n\n");
    out.push_str("This document is generated from `crates/x07derive-core/src/diagnostics.rs`.\n\n");
    out.push_str("| Code | Phase | Severity | Message | Help |\n");
    out.push_str("| ---- | ----- | -------- | ------- | ---- |\n");
    for (code, phase, msg, help) in rows {
        out.push_str(&format!(
            "| {code} | {phase:?} | {:?} | {msg} | {help} |\n",
            Severity::Error
        ));
    }
    out
}

pub(crate) fn all_codes() -> &'static [DiagnosticCode] {
    &[
        DiagnosticCode::X7D0001ParseError,
        DiagnosticCode::X7D0002SchemaVersion,
        DiagnosticCode::X7D0100InvalidIdent,
        DiagnosticCode::X7D0101DuplicateTypeParam,
        DiagnosticCode::X7D0102UnboundTypeVar,
        DiagnosticCode::X7D0103DuplicateField,
        DiagnosticCode::X7D0104DuplicateCtor,
        DiagnosticCode::X7D0105DuplicateTypeName,
        DiagnosticCode::X7D0106DanglingRecursive,
        DiagnosticCode::X7D0107ArityMismatch,
        DiagnosticCode::X7D0108ShadowsTableEntry,
        DiagnosticCode::X7D0200UnsupportedShape,
        DiagnosticCode::X7D0300UnresolvedCapability,
        DiagnosticCode::X7D0400RegionMismatch,
        DiagnosticCode::X7D0401RegionMalformed,
        DiagnosticCode::X7D0402RegionUnknownType,
        DiagnosticCode::X7D0403RegionDuplicate,
        DiagnosticCode::X7D0404RegionUnavailable,
        DiagnosticCode::X7D0901InternalBug,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_every_code_once() {
        let md = render_diagnostics_md();
        for code in all_codes() {
            let needle = format!("| {} |", code.code_str());
            assert_eq!(md.matches(&needle).count(), 1, "{needle}");
        }
    }

    #[test]
    fn display_includes_type_and_help() {
        let d = Diagnostic::for_type(
            DiagnosticCode::X7D0300UnresolvedCapability,
            "bag",
            "no compare for `opaque`",
        );
        let s = d.to_string();
        assert!(s.starts_with("X7D0300 Derive Error: [bag] no compare"), "{s}");
        assert!(s.contains("\n  help: "));
    }
}
