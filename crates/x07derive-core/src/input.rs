//! The JSON input format (`x07derive.types@0.1.0`).

use serde::{Deserialize, Serialize};

use x07_contracts::X07DERIVE_TYPES_SCHEMA_VERSION;

use crate::capability::{CapabilityTable, ExternalDecl};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::shape::{DeriveRequest, TypeDecl, TypeDef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypesInput {
    pub schema_version: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub externals: Vec<ExternalDecl>,
}

impl TypesInput {
    pub fn parse(bytes: &[u8]) -> Result<TypesInput, Diagnostic> {
        let input: TypesInput = serde_json::from_slice(bytes).map_err(|e| {
            Diagnostic::error(DiagnosticCode::X7D0001ParseError, format!("types input: {e}"))
        })?;
        if input.schema_version != X07DERIVE_TYPES_SCHEMA_VERSION {
            return Err(Diagnostic::error(
                DiagnosticCode::X7D0002SchemaVersion,
                format!(
                    "types input schema_version is {:?}, expected {:?}",
                    input.schema_version, X07DERIVE_TYPES_SCHEMA_VERSION
                ),
            ));
        }
        Ok(input)
    }

    /// Validates every declaration, then the request as a whole. Shape errors
    /// of all declarations are reported together.
    pub fn request(&self) -> Result<DeriveRequest, Diagnostics> {
        let mut defs = Vec::with_capacity(self.types.len());
        let mut diags = Vec::new();
        for decl in &self.types {
            match TypeDef::new(decl.name.clone(), decl.params.clone(), decl.body.clone()) {
                Ok(def) => defs.push(def),
                Err(Diagnostics(ds)) => diags.extend(ds),
            }
        }
        if !diags.is_empty() {
            return Err(Diagnostics(diags));
        }
        DeriveRequest::new(defs)
    }

    /// Standard library plus the declared externals.
    pub fn table(&self) -> CapabilityTable {
        CapabilityTable::stdlib().with_externals(&self.externals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{FnKind, Origin};

    #[test]
    fn parses_types_and_externals() {
        let src = br#"{
          "schema_version": "x07derive.types@0.1.0",
          "types": [
            {"name": "id", "body": {"kind": "applied", "name": "uuid", "args": []}},
            {"name": "pair", "params": ["a"], "body": {"kind": "tuple", "items": [
              {"kind": "var", "name": "a"}, {"kind": "primitive", "name": "int"}]}}
          ],
          "externals": [{"name": "uuid", "capabilities": ["sexp", "compare"], "module": "Uuid"}]
        }"#;
        let input = TypesInput::parse(src).expect("parses");
        let req = input.request().expect("valid");
        assert_eq!(req.defs().len(), 2);
        assert_eq!(req.defs()[1].params(), ["a".to_string()]);
        let table = input.table();
        let uuid = table.get("uuid").expect("external registered");
        assert_eq!(uuid.origin, Origin::External);
        assert_eq!(uuid.symbol(FnKind::OfSexp), Some("Uuid.uuid_of_sexp"));
        assert_eq!(uuid.symbol(FnKind::Hash), None);
    }

    #[test]
    fn rejects_other_schema_versions() {
        let err = TypesInput::parse(br#"{"schema_version": "x07derive.types@9", "types": []}"#)
            .expect_err("version");
        assert_eq!(err.code, DiagnosticCode::X7D0002SchemaVersion);
        let err = TypesInput::parse(b"{").expect_err("json");
        assert_eq!(err.code, DiagnosticCode::X7D0001ParseError);
    }

    #[test]
    fn collects_shape_errors_across_declarations() {
        let src = br#"{
          "schema_version": "x07derive.types@0.1.0",
          "types": [
            {"name": "a", "body": {"kind": "var", "name": "x"}},
            {"name": "b", "body": {"kind": "record", "fields": [
              {"name": "f", "ty": {"kind": "primitive", "name": "int"}},
              {"name": "f", "ty": {"kind": "primitive", "name": "int"}}]}}
          ]
        }"#;
        let err = TypesInput::parse(src).expect("parses").request().expect_err("shape errors");
        assert_eq!(
            err.codes(),
            vec![
                DiagnosticCode::X7D0102UnboundTypeVar,
                DiagnosticCode::X7D0103DuplicateField
            ]
        );
    }
}
