use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use x07_contracts::{
    DEFAULT_REGION_MARKER, X07DERIVE_BATCH_REPORT_SCHEMA_VERSION, X07DERIVE_GROUPS_REPORT_SCHEMA_VERSION,
    X07DERIVE_MANIFEST_SCHEMA_VERSION, X07DERIVE_REPORT_SCHEMA_VERSION,
};
use x07derive_core::util::sha256_hex;
use x07derive_core::{
    accept, check, derive_request, resolve_groups, Capability, Diagnostic, DerivationGroup, HostDocument,
    Mismatch, RegionId, TypesInput,
};

#[derive(Parser, Debug)]
#[command(name = "x07derive")]
#[command(about = "Derive comparison, hashing and tree serialization into marked regions.", long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace). `X07DERIVE_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate the regions of one host document.
    Gen {
        #[arg(long)]
        types: PathBuf,
        #[arg(long)]
        doc: PathBuf,
        /// If set, report regions that differ; do not write.
        #[arg(long, default_value_t = false)]
        check: bool,
        /// Region marker keyword (`@<marker>:begin`).
        #[arg(long, default_value = DEFAULT_REGION_MARKER)]
        marker: String,
        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// Regenerate many documents from a manifest, in parallel.
    Batch {
        #[arg(long)]
        manifest: PathBuf,
        /// If set, report regions that differ; do not write.
        #[arg(long, default_value_t = false)]
        check: bool,
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// Print the derivation groups of a types file, in emission order.
    Groups {
        #[arg(long)]
        types: PathBuf,
    },
    /// Print the diagnostics catalog as Markdown.
    DiagnosticsMd,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("X07DERIVE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Gen {
            types,
            doc,
            check,
            marker,
            report_out,
        } => {
            let report = run_gen(&types, &doc, check, &marker)?;
            emit_report(&report, report_out.as_deref())?;
            Ok(exit_for(report.ok))
        }
        Command::Batch {
            manifest,
            check,
            report_out,
        } => {
            let report = run_batch(&manifest, check)?;
            emit_report(&report, report_out.as_deref())?;
            Ok(exit_for(report.ok))
        }
        Command::Groups { types } => run_groups(&types),
        Command::DiagnosticsMd => {
            print!("{}", x07derive_core::diagnostics::render_diagnostics_md());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_for(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn emit_report<T: Serialize>(report: &T, out: Option<&Path>) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(report).context("serialize report")?;
    bytes.push(b'\n');
    match out {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("write report: {}", path.display())),
        None => {
            print!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenReport {
    schema_version: &'static str,
    ok: bool,
    mode: &'static str,
    types: String,
    doc: String,
    types_sha256: String,
    doc_sha256: String,
    mismatches: Vec<Mismatch>,
    diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Vec<RegionId>>,
}

impl GenReport {
    fn new(types: &Path, doc: &Path, check: bool, types_bytes: &[u8], doc_bytes: &[u8]) -> Self {
        GenReport {
            schema_version: X07DERIVE_REPORT_SCHEMA_VERSION,
            ok: false,
            mode: if check { "check" } else { "accept" },
            types: types.display().to_string(),
            doc: doc.display().to_string(),
            types_sha256: sha256_hex(types_bytes),
            doc_sha256: sha256_hex(doc_bytes),
            mismatches: Vec::new(),
            diagnostics: Vec::new(),
            updated: None,
        }
    }

    fn finish(mut self) -> Self {
        self.ok = self.mismatches.is_empty() && self.diagnostics.is_empty();
        self
    }
}

fn run_gen(types_path: &Path, doc_path: &Path, check_only: bool, marker: &str) -> Result<GenReport> {
    let types_bytes =
        std::fs::read(types_path).with_context(|| format!("read types: {}", types_path.display()))?;
    let doc_src = std::fs::read_to_string(doc_path)
        .with_context(|| format!("read document: {}", doc_path.display()))?;
    let mut report = GenReport::new(types_path, doc_path, check_only, &types_bytes, doc_src.as_bytes());

    let input = match TypesInput::parse(&types_bytes) {
        Ok(input) => input,
        Err(d) => {
            report.diagnostics.push(d);
            return Ok(report.finish());
        }
    };
    let req = match input.request() {
        Ok(req) => req,
        Err(ds) => {
            report.diagnostics.extend(ds.0);
            return Ok(report.finish());
        }
    };
    let derivation = derive_request(&req, &input.table(), &Capability::ALL);
    report.diagnostics.extend(derivation.diagnostics().iter().cloned());

    let doc = match HostDocument::parse(&doc_src, marker) {
        Ok(doc) => doc,
        Err(ds) => {
            report.diagnostics.extend(ds.0);
            return Ok(report.finish());
        }
    };
    debug!(doc = %doc_path.display(), regions = doc.regions().len(), "parsed document");

    if check_only {
        let out = check(&doc, &derivation);
        for m in &out.mismatches {
            eprintln!("{}: {}", doc_path.display(), m.to_diagnostic());
        }
        report.mismatches = out.mismatches;
        report.diagnostics.extend(out.diagnostics);
    } else {
        let out = accept(&doc, &derivation);
        if out.text != doc_src {
            std::fs::write(doc_path, out.text.as_bytes())
                .with_context(|| format!("write document: {}", doc_path.display()))?;
            info!(doc = %doc_path.display(), updated = out.updated.len(), "rewrote document");
        }
        report.updated = Some(out.updated);
        report.diagnostics.extend(out.diagnostics);
    }
    Ok(report.finish())
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema_version: String,
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    types: String,
    doc: String,
    #[serde(default)]
    marker: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchEntryReport {
    types: String,
    doc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<GenReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    schema_version: &'static str,
    ok: bool,
    mode: &'static str,
    entries: Vec<BatchEntryReport>,
}

fn run_batch(manifest_path: &Path, check_only: bool) -> Result<BatchReport> {
    let bytes = std::fs::read(manifest_path)
        .with_context(|| format!("read manifest: {}", manifest_path.display()))?;
    let m: Manifest = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse manifest JSON: {}", manifest_path.display()))?;
    if m.schema_version.trim() != X07DERIVE_MANIFEST_SCHEMA_VERSION {
        anyhow::bail!(
            "manifest schema_version mismatch: expected {} got {:?}",
            X07DERIVE_MANIFEST_SCHEMA_VERSION,
            m.schema_version
        );
    }
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut docs: BTreeMap<PathBuf, usize> = BTreeMap::new();
    for (idx, e) in m.entries.iter().enumerate() {
        let doc = base.join(&e.doc);
        let key = std::fs::canonicalize(&doc).unwrap_or(doc);
        if let Some(first) = docs.insert(key, idx) {
            anyhow::bail!(
                "manifest entries [{first}] and [{idx}] name the same document: {}",
                e.doc
            );
        }
    }

    let entries: Vec<BatchEntryReport> = m
        .entries
        .par_iter()
        .enumerate()
        .map(|(idx, e)| {
            let types = base.join(&e.types);
            let doc = base.join(&e.doc);
            let marker = e.marker.as_deref().unwrap_or(DEFAULT_REGION_MARKER);
            let result = run_gen(&types, &doc, check_only, marker)
                .with_context(|| format!("manifest entry[{idx}]"));
            match result {
                Ok(report) => BatchEntryReport {
                    types: e.types.clone(),
                    doc: e.doc.clone(),
                    report: Some(report),
                    error: None,
                },
                Err(err) => BatchEntryReport {
                    types: e.types.clone(),
                    doc: e.doc.clone(),
                    report: None,
                    error: Some(format!("{err:#}")),
                },
            }
        })
        .collect();

    let ok = entries
        .iter()
        .all(|e| e.report.as_ref().is_some_and(|r| r.ok));
    Ok(BatchReport {
        schema_version: X07DERIVE_BATCH_REPORT_SCHEMA_VERSION,
        ok,
        mode: if check_only { "check" } else { "accept" },
        entries,
    })
}

#[derive(Debug, Serialize)]
struct GroupsReport<'a> {
    schema_version: &'static str,
    ok: bool,
    groups: &'a [DerivationGroup],
    diagnostics: Vec<Diagnostic>,
}

fn run_groups(types_path: &Path) -> Result<ExitCode> {
    let bytes =
        std::fs::read(types_path).with_context(|| format!("read types: {}", types_path.display()))?;
    let (groups, diagnostics) = match TypesInput::parse(&bytes) {
        Err(d) => (Vec::new(), vec![d]),
        Ok(input) => match input.request() {
            Ok(req) => (resolve_groups(&req), Vec::new()),
            Err(ds) => (Vec::new(), ds.0),
        },
    };
    let ok = diagnostics.is_empty();
    emit_report(
        &GroupsReport {
            schema_version: X07DERIVE_GROUPS_REPORT_SCHEMA_VERSION,
            ok,
            groups: &groups,
            diagnostics,
        },
        None,
    )?;
    Ok(exit_for(ok))
}
