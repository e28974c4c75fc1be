use std::ops::Range;

use crate::{
    annotate::{annotate, AnnotationResult},
    assemble::assemble,
    config::AsmConfig,
    error::{Diagnostic, ErrorDictionary, LineError, Stage},
    graph::{BurnInfo, ModuleAssemblyGraph, ModuleType, ROOT},
    link::{link, ExportedSymbol, LinkError},
    listing::{listing, object_code_text, symbol_listing},
    preprocess::preprocess,
    registry::MacroRegistry,
    symbol::SymbolRef,
};


/// Symbols an operating system is expected to provide to the simulator.
const DEVICE_SYMBOLS: [&str; 4] = ["charIn", "charOut", "diskIn", "pwrOff"];

/// Addresses stored at the end of an operating system's ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryVector {
    UserStack,
    SystemStack,
    DiskIn,
    CharIn,
    CharOut,
    PowerOff,
    Start,
    Loader,
    Trap,
}

impl MemoryVector {
    /// Distance below the `.BURN` argument.
    pub fn offset(self) -> u16 {
        use MemoryVector::*;
        match self {
            UserStack => 17,
            SystemStack => 15,
            DiskIn => 13,
            CharIn => 11,
            CharOut => 9,
            PowerOff => 7,
            Start => 5,
            Loader => 3,
            Trap => 1,
        }
    }
}

/// Everything produced by a successful run.
#[derive(Debug)]
pub struct ProgramOutput {
    pub object_code: Vec<u8>,
    pub object_text: String,
    pub listing: String,
    pub symbol_listing: String,
    /// First address and one past the last address of the program.
    pub bounds: Range<u32>,
    /// Only set for an operating system.
    pub burn: Option<BurnInfo>,
    pub annotation: AnnotationResult,
    /// Warnings, plus annotation errors, which never fail a run.
    pub diagnostics: ErrorDictionary,
    pub graph: ModuleAssemblyGraph,
}

impl ProgramOutput {
    /// Symbols the program marked with `.EXPORT`, `.SCALL` or `.USCALL`.
    pub fn exports(&self) -> Vec<ExportedSymbol> {
        let table = self.graph.root_table();
        let symbols = &self.graph.symbols;
        symbols
            .table(table)
            .iter()
            .filter(|(_, entry)| entry.exported)
            .filter_map(|(symbol, entry)| {
                Some(ExportedSymbol {
                    name: symbols.resolve(entry.name).to_owned(),
                    value: symbols.value(SymbolRef { table, symbol })?,
                })
            })
            .collect()
    }

    /// Reads one of the addresses stored below the `.BURN` argument.
    pub fn memory_vector(&self, vector: MemoryVector) -> Option<u16> {
        let burn = self.burn?;
        let address = burn.argument.checked_sub(vector.offset())?;
        let index = address.checked_sub(burn.start_rom)? as usize;
        match self.object_code.get(index..index + 2)? {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// Diagnostics of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("assembly failed on {} lines", .errors.source_mapped.len())]
pub struct AsmFailure {
    pub errors: ErrorDictionary,
}

/// Runs every phase over one root module.
pub struct Driver<'r> {
    registry: &'r mut MacroRegistry,
    config: AsmConfig,
}

impl<'r> Driver<'r> {
    pub fn new(registry: &'r mut MacroRegistry, config: AsmConfig) -> Self {
        Self { registry, config }
    }

    /// Assembles a user program, resolving otherwise undefined symbols against the exports of
    /// `os`.
    pub fn assemble_user_program(
        &mut self,
        src: &str,
        os: Option<&ProgramOutput>,
    ) -> Result<ProgramOutput, AsmFailure> {
        let exports = os.map(ProgramOutput::exports);
        self.run(src, ModuleType::UserProgram, exports.as_deref())
    }

    /// Assembles an operating system. Its system calls replace any previously registered ones.
    pub fn assemble_operating_system(&mut self, src: &str) -> Result<ProgramOutput, AsmFailure> {
        self.registry.clear_system_calls();
        self.run(src, ModuleType::OperatingSystem, None)
    }

    fn run(
        &mut self,
        src: &str,
        kind: ModuleType,
        exports: Option<&[ExportedSymbol]>,
    ) -> Result<ProgramOutput, AsmFailure> {
        tracing::info!("assembling {kind:?}");
        let mut graph = ModuleAssemblyGraph::new(src, kind);
        let phases = preprocess(&mut graph, self.registry)
            .and_then(|()| assemble(&mut graph, self.registry))
            .and_then(|()| link(&mut graph, exports, &self.config));
        if let Err(root_errors) = phases {
            tracing::info!("assembly failed with {} errors", root_errors.len());
            let mut errors = std::mem::take(&mut graph.errors);
            for error in root_errors {
                errors.add_source_mapped(error);
            }
            return Err(AsmFailure { errors });
        }

        let annotation = annotate(&mut graph);
        let mut diagnostics = ErrorDictionary::default();
        for error in annotation.warnings.iter().chain(&annotation.errors) {
            diagnostics.add_source_mapped(error.clone());
        }
        for warning in validate(&graph) {
            diagnostics.add_source_mapped(warning);
        }

        let root = graph.root_instance();
        let mut object_code = Vec::new();
        graph.object_code(root, &mut object_code);
        let start = graph
            .instance(root)
            .lines
            .iter()
            .find_map(|line| line.address)
            .map_or(0, u32::from);
        let bounds = start..start + graph.instance_length(root);
        let burn = graph.is_os().then(|| graph.instance(root).burn);
        tracing::info!(
            "assembled {} bytes spanning {:#06X}..{:#06X}",
            object_code.len(),
            bounds.start,
            bounds.end
        );
        Ok(ProgramOutput {
            object_text: object_code_text(&object_code, self.config.bytes_per_line),
            listing: listing(&graph),
            symbol_listing: symbol_listing(&graph),
            object_code,
            bounds,
            burn,
            annotation,
            diagnostics,
            graph,
        })
    }
}

/// Non-fatal checks on a linked program.
fn validate(graph: &ModuleAssemblyGraph) -> Vec<LineError> {
    if !graph.is_os() {
        return Vec::new();
    }
    let table = graph.root_table();
    let end = graph.prototype(ROOT).lines.len();
    DEVICE_SYMBOLS
        .into_iter()
        .filter(|name| {
            !matches!(
                graph.symbols.lookup(table, name),
                Some(id) if graph.symbols.table(table).entry(id).defined
            )
        })
        .map(|name| {
            tracing::warn!("operating system does not define {name}");
            LineError::new(
                end,
                Diagnostic::warning(Stage::BackEnd, LinkError::MissingSymbol(name)),
            )
        })
        .collect()
}
