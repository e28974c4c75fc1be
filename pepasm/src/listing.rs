use std::fmt::Write;

use crate::{
    graph::{InstanceId, ModuleAssemblyGraph},
    ir::{Argument, Line, LineKind},
    isa::AddrMode,
    symbol::{SymbolRef, SymbolValue, TableId},
};


/// Width of the address and object code columns together.
const CODE_COLUMNS: usize = 13;

/// Renders one line the way it would be written by hand, with symbols and arguments normalized.
pub fn source_line(graph: &ModuleAssemblyGraph, table: TableId, line: &Line) -> String {
    use LineKind::*;
    let symbols = &graph.symbols;
    let comment = line.comment.as_deref().unwrap_or_default();
    let symbol = line
        .symbol
        .map(|s| format!("{}:", symbols.name(table, s)))
        .unwrap_or_default();
    let (op, arg) = match &line.kind {
        Blank => return String::new(),
        CommentOnly => return comment.to_owned(),
        Unary { mnemonic, .. } => (mnemonic.name().to_owned(), String::new()),
        NonUnary {
            mnemonic,
            mode,
            arg,
            ..
        } => {
            let mut arg = arg.render(table, symbols);
            if mnemonic.info().mode_required || *mode == AddrMode::X {
                write!(arg, ",{mode}").ok();
            }
            (mnemonic.name().to_owned(), arg)
        }
        Byte(Argument::Hex(v)) => (".BYTE".to_owned(), format!("0x{v:02X}")),
        MacroInvoke { name, args, .. } => (format!("@{name}({})", args.join(",")), String::new()),
        kind => (
            kind.directive().unwrap_or_default().to_owned(),
            kind.argument()
                .map(|a| a.render(table, symbols))
                .unwrap_or_default(),
        ),
    };
    format!("{symbol:<9}{op:<8}{arg:<12}{comment}")
        .trim_end()
        .to_owned()
}

/// The listing of the root module with every macro expanded in place.
pub fn listing(graph: &ModuleAssemblyGraph) -> String {
    let mut out = String::new();
    instance_listing(graph, graph.root_instance(), &mut out);
    out
}

fn instance_listing(graph: &ModuleAssemblyGraph, id: InstanceId, out: &mut String) {
    let instance = graph.instance(id);
    let is_root = id == graph.root_instance();
    for line in &instance.lines {
        if !is_root && line.kind == LineKind::End {
            continue;
        }
        let source = source_line(graph, instance.table, line);
        if let LineKind::MacroInvoke { instance: child, .. } = &line.kind {
            push_trimmed(out, &format!("{:width$}{source}", "", width = CODE_COLUMNS));
            instance_listing(graph, *child, out);
            push_trimmed(out, &format!("{:width$};end macro", "", width = CODE_COLUMNS));
            continue;
        }
        let address = match (&line.kind, line.address) {
            (LineKind::Blank, _) => {
                out.push('\n');
                continue;
            }
            (
                LineKind::Equate(_) | LineKind::Export(_) | LineKind::Scall(_) | LineKind::Uscall(_),
                _,
            )
            | (_, None) => String::new(),
            (LineKind::Align { padding: 0, .. }, _) => String::new(),
            (_, Some(address)) => format!("{address:04X}"),
        };
        let mut bytes = Vec::new();
        line.object_code(instance.table, &graph.symbols, &mut bytes);
        let mut chunks = bytes.chunks(3).map(hex);
        let code = chunks.next().unwrap_or_default();
        push_trimmed(out, &format!("{address:<6}{code:<7}{source}"));
        for code in chunks {
            push_trimmed(out, &format!("      {code}"));
        }
    }
}

fn push_trimmed(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// One line per symbol declared in the root, sorted by name.
pub fn symbol_listing(graph: &ModuleAssemblyGraph) -> String {
    let table = graph.root_table();
    let mut entries: Vec<_> = graph
        .symbols
        .table(table)
        .iter()
        .filter(|(_, entry)| entry.defined && !matches!(entry.value, SymbolValue::External(_)))
        .map(|(symbol, entry)| {
            let name = graph.symbols.resolve(entry.name);
            let value = graph
                .symbols
                .value(SymbolRef { table, symbol })
                .unwrap_or_default();
            (name, value, entry.multiply_defined)
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let mut out = String::new();
    for (name, value, multiply_defined) in entries {
        let note = if multiply_defined {
            " (multiply defined)"
        } else {
            ""
        };
        writeln!(out, "{name:<9}{value:04X}{note}").ok();
    }
    out
}

/// Object code as hex pairs, `per_line` to a line, terminated by `zz`.
pub fn object_code_text(bytes: &[u8], per_line: usize) -> String {
    let per_line = per_line.max(1);
    let mut out = String::with_capacity(bytes.len() * 3 + 2);
    for (i, byte) in bytes.iter().enumerate() {
        write!(out, "{byte:02X}").ok();
        out.push(if i % per_line == per_line - 1 { '\n' } else { ' ' });
    }
    out.push_str("zz");
    out
}
