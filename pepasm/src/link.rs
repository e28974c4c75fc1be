use std::ops::Range;

use crate::{
    config::AsmConfig,
    error::{Diagnostic, LineError, Stage},
    graph::{InstanceId, ModuleAssemblyGraph},
    ir::{Argument, LineKind},
    symbol::{SymbolId, SymbolRef, SymbolValue, TableId},
};

#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Symbol \"{0}\" was previously defined.")]
    MultiplyDefined(String),
    #[error("Attempted to redefine symbol \"{0}\", which was exported from the operating system.")]
    RedefineExport(String),
    #[error("Symbol \"{0}\" is undefined.")]
    Undefined(String),
    #[error("Only operating systems may contain a .BURN.")]
    NoBurn,
    #[error("Operating systems must contain exactly 1 .BURN.")]
    OneBurn,
    #[error(".BURN must have an argument of 0xFFFF.")]
    BurnAtFFFF,
    #[error("Program requires more than 64k bytes of memory.")]
    ExceededMemory,
    #[error("Operating system does not define \"{0}\".")]
    MissingSymbol(&'static str),
}

/// A symbol an operating system makes visible to user programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSymbol {
    pub name: String,
    pub value: u16,
}

/// Assigns addresses and resolves symbols for everything reachable from the root.
///
/// Each macro call site gets its own copy of the invoked instance. An operating system is
/// relocated so that its last byte lands on the `.BURN` argument.
pub fn link(
    graph: &mut ModuleAssemblyGraph,
    exports: Option<&[ExportedSymbol]>,
    config: &AsmConfig,
) -> Result<(), Vec<LineError>> {
    let root = graph.root_instance();
    let mut linker = Linker {
        graph,
        next: 0,
        overflowed: false,
        imports: None,
    };
    if !linker.graph.is_os() {
        if let Some(exports) = exports {
            linker.pull_in(exports);
        }
    }
    let mut errors = linker.link_instance(root);
    if errors.is_empty() {
        errors = linker.finish(config);
    }
    if errors.is_empty() {
        tracing::debug!("linked {} bytes", linker.next);
        return Ok(());
    }
    Err(errors
        .into_iter()
        .map(|(line, error)| {
            let diagnostic = Diagnostic::error(Stage::BackEnd, error);
            linker.graph.errors.add(root, line, diagnostic.clone());
            LineError::new(line, diagnostic)
        })
        .collect())
}

struct Linker<'a> {
    graph: &'a mut ModuleAssemblyGraph,
    next: u32,
    overflowed: bool,
    imports: Option<TableId>,
}

impl Linker<'_> {
    /// Enters the exports into a table of their own and points every root symbol with an
    /// exported name at it.
    fn pull_in(&mut self, exports: &[ExportedSymbol]) {
        let symbols = &mut self.graph.symbols;
        let imports = symbols.new_table();
        for export in exports {
            let name = symbols.intern(&export.name);
            let id = symbols.table_mut(imports).define(name);
            symbols
                .table_mut(imports)
                .set_value(id, SymbolValue::Numeric(export.value));
        }
        self.imports = Some(imports);

        let root_table = self.graph.root_table();
        let symbols = &mut self.graph.symbols;
        let names: Vec<_> = symbols
            .table(root_table)
            .iter()
            .map(|(id, entry)| (id, entry.name))
            .collect();
        for (id, name) in names {
            let Some(export) = symbols.table(imports).get(name) else {
                continue;
            };
            let entry = symbols.table_mut(root_table).entry_mut(id);
            if entry.defined {
                entry.multiply_defined = true;
            }
            entry.defined = true;
            entry.value = SymbolValue::External(SymbolRef {
                table: imports,
                symbol: export,
            });
        }
    }

    fn name(&self, table: TableId, symbol: SymbolId) -> String {
        self.graph.symbols.name(table, symbol).to_owned()
    }

    fn link_instance(&mut self, id: InstanceId) -> Vec<(usize, LinkError)> {
        let table = self.graph.instance(id).table;
        let mut errors = Vec::new();
        for i in 0..self.graph.instance(id).lines.len() {
            let address = self.next as u16;
            let line = &mut self.graph.instance_mut(id).lines[i];
            let source_line = line.source_line;
            line.address = line.kind.is_addressable().then_some(address);
            if let LineKind::Align {
                arg: Argument::UnsignedDec(n),
                padding,
            } = &mut line.kind
            {
                *padding = (*n - address % *n) % *n;
            }
            let is_burn = matches!(line.kind, LineKind::Burn(_));
            let is_equate = matches!(line.kind, LineKind::Equate(_));
            let declared = line.symbol;
            let operand = line.kind.argument().and_then(Argument::symbol);
            let invoked = match &line.kind {
                LineKind::MacroInvoke { instance, .. } => Some(*instance),
                _ => None,
            };
            if is_burn {
                self.graph.instance_mut(id).burn.address = address;
            }

            if let Some(symbol) = declared {
                let entry = self.graph.symbols.table(table).entry(symbol);
                if entry.multiply_defined {
                    let name = self.name(table, symbol);
                    errors.push((
                        source_line,
                        match entry.value {
                            SymbolValue::External(_) => LinkError::RedefineExport(name),
                            _ => LinkError::MultiplyDefined(name),
                        },
                    ));
                    continue;
                }
                if !is_equate {
                    self.graph.symbols.table_mut(table).set_value(
                        symbol,
                        SymbolValue::Location {
                            base: address,
                            offset: 0,
                        },
                    );
                }
            }
            if let Some(symbol) = operand {
                if !self.resolve(id, symbol) {
                    errors.push((source_line, LinkError::Undefined(self.name(table, symbol))));
                    continue;
                }
            }

            if let Some(child) = invoked {
                let clone = self.graph.clone_instance(child);
                if let LineKind::MacroInvoke { instance, .. } =
                    &mut self.graph.instance_mut(id).lines[i].kind
                {
                    *instance = clone;
                }
                let prototype = self.graph.instance(id).prototype;
                self.graph
                    .prototype_mut(prototype)
                    .line_to_instance
                    .insert(source_line, clone);
                let child_errors = self.link_instance(clone);
                if let Some((_, first)) = child_errors.first() {
                    errors.push((source_line, first.clone()));
                }
                for (line, error) in child_errors {
                    let diagnostic = Diagnostic::error(Stage::BackEnd, error);
                    self.graph.errors.add(clone, line, diagnostic);
                }
                continue;
            }

            let line = &self.graph.instance(id).lines[i];
            let length = line.own_length(table, &self.graph.symbols) as u32;
            if self.next + length > 0xFFFF && !self.overflowed {
                self.overflowed = true;
                errors.push((source_line, LinkError::ExceededMemory));
            }
            self.next += length;
        }
        self.graph.instance_mut(id).linked = true;
        tracing::debug!("linked instance {}", id.0);
        errors
    }

    /// Whether `symbol` has a definition visible from `id`.
    ///
    /// A macro falls back on the root, then on the operating system's exports.
    fn resolve(&mut self, id: InstanceId, symbol: SymbolId) -> bool {
        let root = self.graph.root_instance();
        let table = self.graph.instance(id).table;
        let entry = self.graph.symbols.table(table).entry(symbol);
        if entry.defined {
            return true;
        }
        if id == root {
            return false;
        }
        let name = entry.name;
        let root_table = self.graph.root_table();
        let symbols = &mut self.graph.symbols;
        let in_root = match symbols.table(root_table).get(name) {
            Some(found) if symbols.table(root_table).entry(found).defined => found,
            _ => {
                let Some(export) = self
                    .imports
                    .and_then(|imports| Some((imports, symbols.table(imports).get(name)?)))
                else {
                    return false;
                };
                let found = symbols.table_mut(root_table).reference(name);
                let entry = symbols.table_mut(root_table).entry_mut(found);
                entry.defined = true;
                entry.value = SymbolValue::External(SymbolRef {
                    table: export.0,
                    symbol: export.1,
                });
                found
            }
        };
        symbols.table_mut(table).set_value(
            symbol,
            SymbolValue::External(SymbolRef {
                table: root_table,
                symbol: in_root,
            }),
        );
        true
    }

    /// Checks the root's `.BURN`s and relocates an operating system.
    fn finish(&mut self, config: &AsmConfig) -> Vec<(usize, LinkError)> {
        let root = self.graph.root_instance();
        let burn = self.graph.instance(root).burn;
        let burn_lines: Vec<usize> = self
            .graph
            .instance(root)
            .lines
            .iter()
            .filter(|line| matches!(line.kind, LineKind::Burn(_)))
            .map(|line| line.source_line)
            .collect();
        if !self.graph.is_os() {
            return match burn_lines.first() {
                Some(line) => vec![(*line, LinkError::NoBurn)],
                None => Vec::new(),
            };
        }
        if burn.count != 1 {
            let line = burn_lines.get(1).copied().unwrap_or_default();
            return vec![(line, LinkError::OneBurn)];
        }
        if config.force_burn_at_ffff && burn.argument != 0xFFFF {
            let line = burn_lines.first().copied().unwrap_or_default();
            return vec![(line, LinkError::BurnAtFFFF)];
        }
        self.relocate()
    }

    /// Lays the ROM out so its last byte lands as close to the `.BURN` argument as alignment
    /// allows, then packs everything before the `.BURN` down against it.
    fn relocate(&mut self) -> Vec<(usize, LinkError)> {
        let root = self.graph.root_instance();
        let burn = self.graph.instance(root).burn;
        let lines = &self.graph.instance(root).lines;
        let Some(burn_index) = lines
            .iter()
            .position(|line| matches!(line.kind, LineKind::Burn(_)))
        else {
            return Vec::new();
        };
        let burn_line = lines[burn_index].source_line;
        let rom = burn_index..lines.len();

        // Padding depends on where the ROM starts, so settle on the highest start that fits.
        let end = i64::from(burn.argument) + 1;
        let mut start = end - (i64::from(self.next) - i64::from(burn.address));
        while start > 0 && start + self.measure(rom.clone(), start) > end {
            start -= 1;
        }
        while start < end && start + 1 + self.measure(rom.clone(), start + 1) <= end {
            start += 1;
        }
        let mut next = start;
        self.layout_lines(root, rom, &mut next, true);

        let mut below = start;
        for i in (0..burn_index).rev() {
            let table = self.graph.root_table();
            let line = &self.graph.instance(root).lines[i];
            let (length, invoked) = match &line.kind {
                LineKind::MacroInvoke { instance, .. } => {
                    (self.graph.instance_length(*instance), Some(*instance))
                }
                _ => (u32::from(line.own_length(table, &self.graph.symbols)), None),
            };
            let address = match &mut self.graph.instance_mut(root).lines[i].kind {
                LineKind::Align {
                    arg: Argument::UnsignedDec(n),
                    padding,
                } => {
                    let block_start = below - below.rem_euclid(i64::from(*n));
                    *padding = (below - block_start) as u16;
                    block_start
                }
                _ => below - i64::from(length),
            };
            self.place(root, i, address, false);
            if let Some(child) = invoked {
                let mut next = address;
                self.layout(child, &mut next, false);
            }
            below = address;
        }
        if below < 0 {
            return vec![(burn_line, LinkError::ExceededMemory)];
        }

        self.graph.instance_mut(root).burn.start_rom = start as u16;
        tracing::debug!("relocated operating system, ROM starts at {start:#06X}");
        Vec::new()
    }

    /// Bytes taken by `lines` of the root when laid out from `start`.
    fn measure(&mut self, lines: Range<usize>, start: i64) -> i64 {
        let root = self.graph.root_instance();
        let mut next = start;
        self.layout_lines(root, lines, &mut next, true);
        next - start
    }

    fn layout(&mut self, id: InstanceId, next: &mut i64, emit: bool) {
        let len = self.graph.instance(id).lines.len();
        self.layout_lines(id, 0..len, next, emit);
    }

    /// Assigns final addresses to `lines` of `id`, recomputing `.ALIGN` padding on the way.
    fn layout_lines(&mut self, id: InstanceId, lines: Range<usize>, next: &mut i64, emit: bool) {
        let table = self.graph.instance(id).table;
        for i in lines {
            let address = *next;
            let line = &mut self.graph.instance_mut(id).lines[i];
            if let LineKind::Align {
                arg: Argument::UnsignedDec(n),
                padding,
            } = &mut line.kind
            {
                let n = i64::from(*n);
                *padding = (n - address.rem_euclid(n)).rem_euclid(n) as u16;
            }
            let invoked = match &line.kind {
                LineKind::MacroInvoke { instance, .. } => Some(*instance),
                _ => None,
            };
            self.place(id, i, address, emit);
            match invoked {
                Some(child) => self.layout(child, next, emit),
                None => {
                    let line = &self.graph.instance(id).lines[i];
                    *next += i64::from(line.own_length(table, &self.graph.symbols));
                }
            }
        }
    }

    /// Puts line `i` of `id` at `address`. Past 0xFFFF a line keeps no address.
    fn place(&mut self, id: InstanceId, i: usize, address: i64, emit: bool) {
        let table = self.graph.instance(id).table;
        let line = &mut self.graph.instance_mut(id).lines[i];
        let in_memory = (0..=0xFFFF).contains(&address);
        line.emit = emit;
        line.address = (line.kind.is_addressable() && in_memory).then_some(address as u16);
        let declared = line
            .symbol
            .filter(|_| !matches!(line.kind, LineKind::Equate(_)));
        if let Some(symbol) = declared {
            self.graph.symbols.table_mut(table).set_value(
                symbol,
                SymbolValue::Location {
                    base: address as u16,
                    offset: 0,
                },
            );
        }
    }
}
