//! Region verifier: finds marked regions in a host document and compares or
//! replaces their text with freshly generated binding sets.
//!
//! A region is delimited by two marker lines:
//!
//! ```text
//! ;; @derive:begin tree compare
//! ... generated text ...
//! ;; @derive:end tree compare
//! ```
//!
//! Whatever precedes the `@` on a marker line is preserved and ignored, so any
//! comment syntax works. Only the lines strictly between the markers are ever
//! read or replaced.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::capability::Capability;
use crate::derive::Derivation;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RegionId {
    pub type_name: String,
    pub capability: Capability,
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name, self.capability)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: RegionId,
    /// 1-based line numbers of the marker lines.
    pub begin_line: usize,
    pub end_line: usize,
    /// Leading whitespace of the begin marker line.
    pub indent: String,
    pub stored: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub region: RegionId,
    pub begin_line: usize,
    pub stored: String,
    pub generated: String,
}

impl Mismatch {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::for_type(
            DiagnosticCode::X7D0400RegionMismatch,
            &self.region.type_name,
            format!("line {}: region `{}` differs from generated text", self.begin_line, self.region),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDocument {
    lines: Vec<String>,
    regions: Vec<Region>,
}

enum Marker<'a> {
    Begin(&'a str, &'a str),
    End(&'a str, &'a str),
}

fn find_marker<'a>(line: &'a str, keyword: &str) -> Option<Marker<'a>> {
    for (tag, is_begin) in [("begin", true), ("end", false)] {
        let token = format!("@{keyword}:{tag}");
        let Some(pos) = line.find(&token) else {
            continue;
        };
        let rest = &line[pos + token.len()..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let mut words = rest.split_whitespace();
        let ty = words.next().unwrap_or("");
        let cap = words.next().unwrap_or("");
        return Some(if is_begin {
            Marker::Begin(ty, cap)
        } else {
            Marker::End(ty, cap)
        });
    }
    None
}

fn malformed(line: usize, message: impl fmt::Display) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::X7D0401RegionMalformed,
        format!("line {line}: {message}"),
    )
}

impl HostDocument {
    /// Splits `text` into regions delimited by `@<keyword>:begin` and
    /// `@<keyword>:end` marker lines. Every structural problem is reported.
    pub fn parse(text: &str, keyword: &str) -> Result<HostDocument, Diagnostics> {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut regions = Vec::new();
        let mut diags = Vec::new();
        let mut open: Option<(usize, RegionId, String)> = None;

        for (idx, line) in lines.iter().enumerate() {
            let lineno = idx + 1;
            match find_marker(line, keyword) {
                None => {}
                Some(Marker::Begin(ty, cap)) => {
                    if let Some((begin, id, _)) = &open {
                        diags.push(malformed(
                            lineno,
                            format!("begin marker inside region `{id}` opened on line {}", begin + 1),
                        ));
                    }
                    open = None;
                    let Some(capability) = Capability::parse(cap) else {
                        diags.push(malformed(
                            lineno,
                            format!("begin marker needs `<type> <capability>`, got `{ty} {cap}`"),
                        ));
                        continue;
                    };
                    if ty.is_empty() {
                        diags.push(malformed(lineno, "begin marker without a type name"));
                        continue;
                    }
                    let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
                    open = Some((
                        idx,
                        RegionId {
                            type_name: ty.to_string(),
                            capability,
                        },
                        indent,
                    ));
                }
                Some(Marker::End(ty, cap)) => {
                    let Some((begin, id, indent)) = open.take() else {
                        diags.push(malformed(lineno, "end marker without a matching begin"));
                        continue;
                    };
                    if id.type_name != ty || id.capability.as_str() != cap {
                        diags.push(malformed(
                            lineno,
                            format!("end marker `{ty} {cap}` does not match begin `{id}` on line {}", begin + 1),
                        ));
                        continue;
                    }
                    regions.push(Region {
                        stored: lines[begin + 1..idx].concat(),
                        id,
                        begin_line: begin + 1,
                        end_line: lineno,
                        indent,
                    });
                }
            }
        }
        if let Some((begin, id, _)) = open {
            diags.push(malformed(begin + 1, format!("region `{id}` is never closed")));
        }

        if diags.is_empty() {
            Ok(HostDocument { lines, regions })
        } else {
            Err(Diagnostics(diags))
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Generation-time normalization: indent every non-empty line by `indent`
/// and terminate every line with `\n`.
pub fn reindent(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Generated text for every region that can be served, plus the diagnostics
/// for those that cannot.
fn plan(doc: &HostDocument, derivation: &Derivation) -> (Vec<Option<String>>, Vec<Diagnostic>) {
    let mut seen: BTreeMap<(String, Capability), usize> = BTreeMap::new();
    let mut generated = Vec::with_capacity(doc.regions.len());
    let mut diags = Vec::new();

    for region in &doc.regions {
        let id = &region.id;
        let Some(group) = derivation.group_of(&id.type_name) else {
            diags.push(Diagnostic::for_type(
                DiagnosticCode::X7D0402RegionUnknownType,
                &id.type_name,
                format!("line {}: region `{id}` names a type that is not defined", region.begin_line),
            ));
            generated.push(None);
            continue;
        };
        let key = (group.members[0].clone(), id.capability);
        if let Some(&first) = seen.get(&key) {
            diags.push(Diagnostic::for_type(
                DiagnosticCode::X7D0403RegionDuplicate,
                &id.type_name,
                format!(
                    "line {}: region `{id}` repeats the {} binding set of group {{{}}} already placed on line {first}",
                    region.begin_line,
                    id.capability,
                    group.members.join(", ")
                ),
            ));
            generated.push(None);
            continue;
        }
        seen.insert(key, region.begin_line);
        let Some(set) = derivation.binding_set_for(&id.type_name, id.capability) else {
            diags.push(Diagnostic::for_type(
                DiagnosticCode::X7D0404RegionUnavailable,
                &id.type_name,
                format!("line {}: region `{id}` has no generated text", region.begin_line),
            ));
            generated.push(None);
            continue;
        };
        generated.push(Some(reindent(&set.text, &region.indent)));
    }
    (generated, diags)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub mismatches: Vec<Mismatch>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.diagnostics.is_empty()
    }
}

/// Reports every region whose stored text differs from what would be
/// generated. The document is not modified.
pub fn check(doc: &HostDocument, derivation: &Derivation) -> CheckReport {
    let (generated, diagnostics) = plan(doc, derivation);
    let mut mismatches = Vec::new();
    for (region, gen) in doc.regions.iter().zip(generated) {
        let Some(gen) = gen else { continue };
        if region.stored != gen {
            debug!(region = %region.id, line = region.begin_line, "region differs");
            mismatches.push(Mismatch {
                region: region.id.clone(),
                begin_line: region.begin_line,
                stored: region.stored.clone(),
                generated: gen,
            });
        }
    }
    CheckReport {
        mismatches,
        diagnostics,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptOutcome {
    /// The rewritten document; markers and text outside regions are untouched.
    pub text: String,
    /// Regions whose text changed.
    pub updated: Vec<RegionId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Overwrites every servable region with its generated text. Regions with
/// diagnostics keep their stored text.
pub fn accept(doc: &HostDocument, derivation: &Derivation) -> AcceptOutcome {
    let (generated, diagnostics) = plan(doc, derivation);
    let mut out = String::new();
    let mut updated = Vec::new();
    let mut next = 0usize;
    for (region, gen) in doc.regions.iter().zip(generated) {
        // begin_line is 1-based, so the begin marker sits at index begin_line - 1.
        for line in &doc.lines[next..region.begin_line] {
            out.push_str(line);
        }
        match gen {
            Some(gen) => {
                if gen != region.stored {
                    updated.push(region.id.clone());
                }
                out.push_str(&gen);
            }
            None => out.push_str(&region.stored),
        }
        next = region.end_line - 1;
    }
    for line in &doc.lines[next..] {
        out.push_str(line);
    }
    AcceptOutcome {
        text: out,
        updated,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_regions_with_any_comment_prefix() {
        let text = "header\n  // @derive:begin t compare\n  old\n  // @derive:end t compare\n# @derive:begin u sexp */\n# @derive:end u sexp\ntail";
        let doc = HostDocument::parse(text, "derive").expect("parses");
        assert_eq!(doc.regions().len(), 2);
        let r = &doc.regions()[0];
        assert_eq!(r.id.type_name, "t");
        assert_eq!(r.id.capability, Capability::Compare);
        assert_eq!((r.begin_line, r.end_line), (2, 4));
        assert_eq!(r.indent, "  ");
        assert_eq!(r.stored, "  old\n");
        assert_eq!(doc.regions()[1].stored, "");
        assert_eq!(doc.text(), text);
    }

    #[test]
    fn reports_every_structural_problem() {
        let text = "@derive:end a hash\n@derive:begin a hash\n@derive:begin b hash\n@derive:end c hash\n@derive:begin d frob\n@derive:begin e sexp\n";
        let err = HostDocument::parse(text, "derive").expect_err("malformed");
        assert_eq!(err.0.len(), 5, "{err}");
        assert!(err.0.iter().all(|d| d.code == DiagnosticCode::X7D0401RegionMalformed));
        assert!(err.0[4].message.contains("never closed"), "{err}");
    }

    #[test]
    fn marker_keyword_is_configurable() {
        let text = "@gen:begin t hash\n@gen:end t hash\n@derive:begin x y\n";
        let doc = HostDocument::parse(text, "gen").expect("parses");
        assert_eq!(doc.regions().len(), 1);
    }

    #[test]
    fn reindent_prefixes_non_empty_lines() {
        assert_eq!(reindent("(a\n  b)\n\n(c)", "  "), "  (a\n    b)\n\n  (c)\n");
    }
}
