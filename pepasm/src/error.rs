use std::collections::BTreeMap;

use crate::{
    annotate::AnnotateError, assemble::AssembleError, graph::InstanceId, link::LinkError,
    preprocess::PreprocessError,
};


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FrontEnd,
    BackEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub error: AsmError,
}

impl Diagnostic {
    pub fn error(stage: Stage, error: impl Into<AsmError>) -> Self {
        Self {
            severity: Severity::Error,
            stage,
            error: error.into(),
        }
    }
    pub fn warning(stage: Stage, error: impl Into<AsmError>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            error: error.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, ";WARNING: {}", self.error),
            Severity::Error => write!(f, ";ERROR: {}", self.error),
        }
    }
}

/// A diagnostic attributed to one line of the root module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub diagnostic: Diagnostic,
}

impl LineError {
    pub fn new(line: usize, diagnostic: Diagnostic) -> Self {
        Self { line, diagnostic }
    }
}

/// Diagnostics per instance and line, plus the same diagnostics mapped onto root lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDictionary {
    pub errors: BTreeMap<InstanceId, BTreeMap<usize, Vec<Diagnostic>>>,
    pub source_mapped: BTreeMap<usize, Vec<Diagnostic>>,
}

impl ErrorDictionary {
    pub fn add(&mut self, instance: InstanceId, line: usize, diagnostic: Diagnostic) {
        self.errors
            .entry(instance)
            .or_default()
            .entry(line)
            .or_default()
            .push(diagnostic);
    }
    pub fn add_source_mapped(&mut self, error: LineError) {
        self.source_mapped
            .entry(error.line)
            .or_default()
            .push(error.diagnostic);
    }
    pub fn module_errors(&self, instance: InstanceId) -> Option<&BTreeMap<usize, Vec<Diagnostic>>> {
        self.errors.get(&instance)
    }
    pub fn has_errors(&self) -> bool {
        self.source_mapped
            .values()
            .flatten()
            .any(|d| d.severity == Severity::Error)
    }
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.source_mapped.is_empty()
    }
    /// Root mapped diagnostics in line order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Diagnostic)> {
        self.source_mapped
            .iter()
            .flat_map(|(line, ds)| ds.iter().map(move |d| (*line, d)))
    }
    /// Interleaves diagnostics with the source they belong to, one diagnostic per line below
    /// its source line. Diagnostics past the last line are appended at the end.
    pub fn annotate_source(&self, source: &str) -> String {
        let lines: Vec<&str> = source.lines().collect();
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            out.push_str(line);
            out.push('\n');
            for d in self.source_mapped.get(&i).into_iter().flatten() {
                out.push_str(&format!("{d}\n"));
            }
        }
        for d in self.source_mapped.range(lines.len()..).flat_map(|(_, ds)| ds) {
            out.push_str(&format!("{d}\n"));
        }
        out
    }
}
