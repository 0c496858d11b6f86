//! Type-shape model: the explicit, serializable description of type
//! definitions that drives every generator.
//!
//! A [`TypeDef`] is validated when it is constructed (or deserialized) and is
//! immutable afterwards, so one value can be shared by the comparison, hash and
//! serialization generators. Cross-definition checks (dangling recursive
//! references, duplicate names, arities) live on [`DeriveRequest`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ctor {
    pub name: String,
    #[serde(default)]
    pub args: Vec<TypeShape>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape {
    Primitive {
        name: String,
    },
    Tuple {
        items: Vec<TypeShape>,
    },
    Record {
        fields: Vec<Field>,
    },
    Variant {
        ctors: Vec<Ctor>,
    },
    /// A named type constructor applied to arguments (`int list`, `(k, v) map`).
    Applied {
        name: String,
        #[serde(default)]
        args: Vec<TypeShape>,
    },
    #[serde(rename = "var")]
    TypeVar {
        name: String,
    },
    /// Back-reference to a definition of the same request, instantiated with the
    /// referencing definition's own parameters.
    Recursive {
        name: String,
    },
    Function {
        params: Vec<TypeShape>,
        result: Box<TypeShape>,
    },
}

impl TypeShape {
    pub fn prim(name: &str) -> Self {
        TypeShape::Primitive {
            name: name.to_string(),
        }
    }

    pub fn tuple(items: impl IntoIterator<Item = TypeShape>) -> Self {
        TypeShape::Tuple {
            items: items.into_iter().collect(),
        }
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, TypeShape)>) -> Self {
        TypeShape::Record {
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }
    }

    pub fn variant<'a>(ctors: impl IntoIterator<Item = (&'a str, Vec<TypeShape>)>) -> Self {
        TypeShape::Variant {
            ctors: ctors
                .into_iter()
                .map(|(name, args)| Ctor {
                    name: name.to_string(),
                    args,
                })
                .collect(),
        }
    }

    pub fn applied(name: &str, args: impl IntoIterator<Item = TypeShape>) -> Self {
        TypeShape::Applied {
            name: name.to_string(),
            args: args.into_iter().collect(),
        }
    }

    pub fn var(name: &str) -> Self {
        TypeShape::TypeVar {
            name: name.to_string(),
        }
    }

    pub fn recursive(name: &str) -> Self {
        TypeShape::Recursive {
            name: name.to_string(),
        }
    }

    pub fn function(params: impl IntoIterator<Item = TypeShape>, result: TypeShape) -> Self {
        TypeShape::Function {
            params: params.into_iter().collect(),
            result: Box::new(result),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            TypeShape::Primitive { .. } => "primitive",
            TypeShape::Tuple { .. } => "tuple",
            TypeShape::Record { .. } => "record",
            TypeShape::Variant { .. } => "variant",
            TypeShape::Applied { .. } => "applied",
            TypeShape::TypeVar { .. } => "var",
            TypeShape::Recursive { .. } => "recursive",
            TypeShape::Function { .. } => "function",
        }
    }

    /// Visits every named reference (`Applied` and `Recursive`) in pre-order.
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(NamedRef<'a>)) {
        match self {
            TypeShape::Primitive { .. } | TypeShape::TypeVar { .. } => {}
            TypeShape::Tuple { items } => items.iter().for_each(|t| t.for_each_reference(f)),
            TypeShape::Record { fields } => {
                fields.iter().for_each(|fl| fl.ty.for_each_reference(f))
            }
            TypeShape::Variant { ctors } => ctors
                .iter()
                .flat_map(|c| c.args.iter())
                .for_each(|t| t.for_each_reference(f)),
            TypeShape::Applied { name, args } => {
                f(NamedRef::Applied {
                    name,
                    arity: args.len(),
                });
                args.iter().for_each(|t| t.for_each_reference(f));
            }
            TypeShape::Recursive { name } => f(NamedRef::Recursive { name }),
            TypeShape::Function { params, result } => {
                params.iter().for_each(|t| t.for_each_reference(f));
                result.for_each_reference(f);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedRef<'a> {
    Applied { name: &'a str, arity: usize },
    Recursive { name: &'a str },
}

impl<'a> NamedRef<'a> {
    pub fn name(self) -> &'a str {
        match self {
            NamedRef::Applied { name, .. } | NamedRef::Recursive { name } => name,
        }
    }
}

/// Unvalidated wire form of a [`TypeDef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub body: TypeShape,
}

/// One source type declaration: `type ('a, 'b) name = body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TypeDecl", into = "TypeDecl")]
pub struct TypeDef {
    name: String,
    params: Vec<String>,
    body: TypeShape,
}

impl TypeDef {
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = impl Into<String>>,
        body: TypeShape,
    ) -> Result<TypeDef, Diagnostics> {
        let def = TypeDef {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            body,
        };
        let mut diags = Vec::new();
        def.check(&mut diags);
        if diags.is_empty() {
            Ok(def)
        } else {
            Err(Diagnostics(diags))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn body(&self) -> &TypeShape {
        &self.body
    }

    fn check(&self, diags: &mut Vec<Diagnostic>) {
        if !is_ident(&self.name) {
            diags.push(Diagnostic::for_type(
                DiagnosticCode::X7D0100InvalidIdent,
                &self.name,
                format!("invalid type name {:?}", self.name),
            ));
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for p in &self.params {
            if !is_ident(p) {
                diags.push(Diagnostic::for_type(
                    DiagnosticCode::X7D0100InvalidIdent,
                    &self.name,
                    format!("invalid type parameter {p:?}"),
                ));
            }
            if !seen.insert(p.as_str()) {
                diags.push(Diagnostic::for_type(
                    DiagnosticCode::X7D0101DuplicateTypeParam,
                    &self.name,
                    format!("type parameter `{p}` is declared twice"),
                ));
            }
        }
        self.check_shape(&self.body, &seen, diags);
    }

    fn check_shape(&self, shape: &TypeShape, bound: &BTreeSet<&str>, diags: &mut Vec<Diagnostic>) {
        match shape {
            TypeShape::Primitive { name } | TypeShape::Recursive { name } => {
                if !is_ident(name) {
                    diags.push(Diagnostic::for_type(
                        DiagnosticCode::X7D0100InvalidIdent,
                        &self.name,
                        format!("invalid {} name {name:?}", shape.kind_str()),
                    ));
                }
            }
            TypeShape::TypeVar { name } => {
                if !bound.contains(name.as_str()) {
                    diags.push(Diagnostic::for_type(
                        DiagnosticCode::X7D0102UnboundTypeVar,
                        &self.name,
                        format!("type variable `{name}` is not a parameter of `{}`", self.name),
                    ));
                }
            }
            TypeShape::Tuple { items } => {
                for t in items {
                    self.check_shape(t, bound, diags);
                }
            }
            TypeShape::Record { fields } => {
                let mut seen: BTreeSet<&str> = BTreeSet::new();
                for f in fields {
                    if !is_ident(&f.name) {
                        diags.push(Diagnostic::for_type(
                            DiagnosticCode::X7D0100InvalidIdent,
                            &self.name,
                            format!("invalid field name {:?}", f.name),
                        ));
                    }
                    if !seen.insert(f.name.as_str()) {
                        diags.push(Diagnostic::for_type(
                            DiagnosticCode::X7D0103DuplicateField,
                            &self.name,
                            format!("field `{}` is declared twice", f.name),
                        ));
                    }
                    self.check_shape(&f.ty, bound, diags);
                }
            }
            TypeShape::Variant { ctors } => {
                let mut seen: BTreeSet<&str> = BTreeSet::new();
                for c in ctors {
                    if !is_ident(&c.name) {
                        diags.push(Diagnostic::for_type(
                            DiagnosticCode::X7D0100InvalidIdent,
                            &self.name,
                            format!("invalid constructor name {:?}", c.name),
                        ));
                    }
                    if !seen.insert(c.name.as_str()) {
                        diags.push(Diagnostic::for_type(
                            DiagnosticCode::X7D0104DuplicateCtor,
                            &self.name,
                            format!("constructor `{}` is declared twice", c.name),
                        ));
                    }
                    for t in &c.args {
                        self.check_shape(t, bound, diags);
                    }
                }
            }
            TypeShape::Applied { name, args } => {
                if !is_ident(name) {
                    diags.push(Diagnostic::for_type(
                        DiagnosticCode::X7D0100InvalidIdent,
                        &self.name,
                        format!("invalid type constructor name {name:?}"),
                    ));
                }
                for t in args {
                    self.check_shape(t, bound, diags);
                }
            }
            TypeShape::Function { params, result } => {
                for t in params {
                    self.check_shape(t, bound, diags);
                }
                self.check_shape(result, bound, diags);
            }
        }
    }
}

impl TryFrom<TypeDecl> for TypeDef {
    type Error = Diagnostics;

    fn try_from(raw: TypeDecl) -> Result<Self, Self::Error> {
        TypeDef::new(raw.name, raw.params, raw.body)
    }
}

impl From<TypeDef> for TypeDecl {
    fn from(def: TypeDef) -> Self {
        TypeDecl {
            name: def.name,
            params: def.params,
            body: def.body,
        }
    }
}

/// Every type definition of one derivation request, cross-checked.
#[derive(Debug, Clone)]
pub struct DeriveRequest {
    defs: Vec<TypeDef>,
    index: BTreeMap<String, usize>,
}

impl DeriveRequest {
    /// Collects every shape error of the request; any error aborts the request.
    pub fn new(defs: Vec<TypeDef>) -> Result<DeriveRequest, Diagnostics> {
        let mut diags = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        for (idx, def) in defs.iter().enumerate() {
            if index.insert(def.name.clone(), idx).is_some() {
                diags.push(Diagnostic::for_type(
                    DiagnosticCode::X7D0105DuplicateTypeName,
                    &def.name,
                    format!("type `{}` is defined more than once", def.name),
                ));
            }
        }

        for def in &defs {
            def.body.for_each_reference(&mut |r| match r {
                NamedRef::Recursive { name } => match index.get(name) {
                    None => diags.push(Diagnostic::for_type(
                        DiagnosticCode::X7D0106DanglingRecursive,
                        &def.name,
                        format!("recursive reference to `{name}`, which is not in this request"),
                    )),
                    Some(&target) if defs[target].arity() != def.arity() => {
                        diags.push(Diagnostic::for_type(
                            DiagnosticCode::X7D0107ArityMismatch,
                            &def.name,
                            format!(
                                "recursive reference to `{name}` (arity {}) from a definition of arity {}",
                                defs[target].arity(),
                                def.arity()
                            ),
                        ))
                    }
                    Some(_) => {}
                },
                NamedRef::Applied { name, arity } => {
                    if let Some(&target) = index.get(name) {
                        if defs[target].arity() != arity {
                            diags.push(Diagnostic::for_type(
                                DiagnosticCode::X7D0107ArityMismatch,
                                &def.name,
                                format!(
                                    "`{name}` takes {} type argument(s), applied to {arity}",
                                    defs[target].arity()
                                ),
                            ));
                        }
                    }
                }
            });
        }

        if diags.is_empty() {
            Ok(DeriveRequest { defs, index })
        } else {
            Err(Diagnostics(diags))
        }
    }

    pub fn defs(&self) -> &[TypeDef] {
        &self.defs
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.index.get(name).map(|&idx| &self.defs[idx])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Indices of the in-request definitions that `def` refers to, deduplicated,
    /// in first-reference order.
    pub fn dependencies(&self, def: &TypeDef) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        def.body.for_each_reference(&mut |r| {
            if let Some(idx) = self.position(r.name()) {
                if !out.contains(&idx) {
                    out.push(idx);
                }
            }
        });
        out
    }
}

pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(err: Diagnostics) -> Vec<DiagnosticCode> {
        err.codes()
    }

    #[test]
    fn unbound_type_var_is_a_shape_error() {
        let err = TypeDef::new("box", ["a"], TypeShape::tuple([TypeShape::var("b")]))
            .expect_err("unbound");
        assert_eq!(codes(err), vec![DiagnosticCode::X7D0102UnboundTypeVar]);
    }

    #[test]
    fn duplicate_field_and_ctor_are_reported_together() {
        let body = TypeShape::variant([
            (
                "A",
                vec![TypeShape::record([
                    ("x", TypeShape::prim("int")),
                    ("x", TypeShape::prim("int")),
                ])],
            ),
            ("A", vec![]),
        ]);
        let err = TypeDef::new("t", Vec::<String>::new(), body).expect_err("dups");
        assert_eq!(
            codes(err),
            vec![
                DiagnosticCode::X7D0103DuplicateField,
                DiagnosticCode::X7D0104DuplicateCtor
            ]
        );
    }

    #[test]
    fn deserialization_validates() {
        let bad = r#"{"name":"t","params":["a","a"],"body":{"kind":"var","name":"a"}}"#;
        let err = serde_json::from_str::<TypeDef>(bad).expect_err("dup param");
        assert!(err.to_string().contains("X7D0101"), "{err}");

        let good = r#"{"name":"pair","params":["a"],"body":{"kind":"tuple","items":[{"kind":"var","name":"a"},{"kind":"primitive","name":"int"}]}}"#;
        let def: TypeDef = serde_json::from_str(good).expect("valid");
        assert_eq!(def.arity(), 1);
        assert_eq!(
            def.body(),
            &TypeShape::tuple([TypeShape::var("a"), TypeShape::prim("int")])
        );
    }

    #[test]
    fn request_rejects_dangling_and_arity_mismatch() {
        let a = TypeDef::new("a", Vec::<String>::new(), TypeShape::recursive("nope")).unwrap();
        let b = TypeDef::new(
            "b",
            ["x"],
            TypeShape::tuple([TypeShape::applied("b", [])]),
        )
        .unwrap();
        let err = DeriveRequest::new(vec![a, b]).expect_err("errors");
        assert_eq!(
            codes(err),
            vec![
                DiagnosticCode::X7D0106DanglingRecursive,
                DiagnosticCode::X7D0107ArityMismatch
            ]
        );
    }

    #[test]
    fn external_applied_names_are_not_errors() {
        let a = TypeDef::new(
            "a",
            Vec::<String>::new(),
            TypeShape::applied("list", [TypeShape::applied("uuid", [])]),
        )
        .unwrap();
        let req = DeriveRequest::new(vec![a]).expect("external refs are fine");
        assert!(req.dependencies(&req.defs()[0]).is_empty());
    }

    #[test]
    fn identifiers() {
        assert!(is_ident("tree"));
        assert!(is_ident("t'"));
        assert!(is_ident("_x1"));
        assert!(!is_ident(""));
        assert!(!is_ident("1x"));
        assert!(!is_ident("a b"));
    }
}
