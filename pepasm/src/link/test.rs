use expect_test::{expect, Expect};

use super::{link, ExportedSymbol};
use crate::{
    assemble::assemble,
    config::AsmConfig,
    graph::{ModuleAssemblyGraph, ModuleType},
    ir::LineKind,
    preprocess::preprocess,
    registry::MacroRegistry,
    symbol::SymbolRef,
};

fn registry() -> MacroRegistry {
    let mut registry = MacroRegistry::new();
    registry.register_core_macro("XCHGA", "@XCHGA 2\nSTWA $1,$2\n.END\n");
    registry.register_core_macro("JMP", "@JMP 0\nBR target\n.END\n");
    registry.register_core_macro("GETC", "@GETC 0\nLDBA charIn,d\n.END\n");
    registry.register_core_macro("TWICE", "@TWICE 0\n@JMP\nlocal: @JMP\n.END\n");
    registry
}

fn exports() -> Vec<ExportedSymbol> {
    vec![ExportedSymbol {
        name: "charIn".to_owned(),
        value: 0xFC15,
    }]
}

fn build(
    src: &str,
    kind: ModuleType,
    exports: Option<&[ExportedSymbol]>,
    config: AsmConfig,
) -> (ModuleAssemblyGraph, String) {
    let mut registry = registry();
    let mut graph = ModuleAssemblyGraph::new(src, kind);
    let result = preprocess(&mut graph, &registry)
        .and_then(|()| assemble(&mut graph, &mut registry))
        .and_then(|()| link(&mut graph, exports, &config));
    let output = match result {
        Ok(()) => {
            let root = graph.instance(graph.root_instance());
            let mut out = String::new();
            for line in &root.lines {
                let address = line
                    .address
                    .map_or("----".to_owned(), |a| format!("{a:04X}"));
                let emit = if line.emit { "" } else { " (no emit)" };
                out.push_str(&format!("{}: {address}{emit}\n", line.source_line));
            }
            let mut bytes = Vec::new();
            graph.object_code(graph.root_instance(), &mut bytes);
            out.push_str(&format!("{bytes:02X?}\n"));
            out
        }
        Err(errors) => errors
            .iter()
            .map(|e| format!("{}: {}\n", e.line, e.diagnostic))
            .collect(),
    };
    (graph, output)
}

fn check(src: &str, expect: Expect) {
    let (_, output) = build(src, ModuleType::UserProgram, None, AsmConfig::default());
    expect.assert_eq(&output);
}

fn check_os(src: &str, expect: Expect) {
    let (_, output) = build(src, ModuleType::OperatingSystem, None, AsmConfig::default());
    expect.assert_eq(&output);
}

fn symbol(graph: &ModuleAssemblyGraph, name: &str) -> Option<u16> {
    let table = graph.root_table();
    let symbol = graph.symbols.lookup(table, name)?;
    graph.symbols.value(SymbolRef { table, symbol })
}

#[test]
fn addresses() {
    let (graph, output) = build(
        "NOP\nLDWA 5,i\nx: .BLOCK 3\n.ALIGN 4\ny: .WORD 1\nz: .EQUATE 9\n.END",
        ModuleType::UserProgram,
        None,
        AsmConfig::default(),
    );
    expect![[r#"
        0: 0000
        1: 0001
        2: 0004
        3: 0007
        4: 0008
        5: 000A
        6: 000A
        [07, 40, 00, 05, 00, 00, 00, 00, 00, 01]
    "#]]
    .assert_eq(&output);
    assert_eq!(symbol(&graph, "x"), Some(4));
    assert_eq!(symbol(&graph, "y"), Some(8));
    assert_eq!(symbol(&graph, "z"), Some(9));
    let root = graph.instance(graph.root_instance());
    assert_eq!(root.lines[3].kind, LineKind::Align {
        arg: crate::ir::Argument::UnsignedDec(4),
        padding: 1,
    });
    assert_eq!(graph.instance_length(graph.root_instance()), 10);
}

#[test]
fn comments_have_no_address() {
    check("; c\n\nNOP\n.END", expect![[r#"
        0: ----
        1: ----
        2: 0000
        3: 0001
        [07]
    "#]]);
}

#[test]
fn clones_per_call_site() {
    let src = "@XCHGA x,d\n@xchga X,D\nx: .WORD 0\n.END";
    let mut registry = registry();
    let mut graph = ModuleAssemblyGraph::new(src, ModuleType::UserProgram);
    preprocess(&mut graph, &registry).unwrap();
    let invoked = |graph: &ModuleAssemblyGraph, line: usize| {
        match graph.instance(graph.root_instance()).lines[line].kind {
            LineKind::MacroInvoke { instance, .. } => instance,
            _ => panic!("expected a macro invocation"),
        }
    };
    assemble(&mut graph, &mut registry).unwrap();
    assert_eq!(invoked(&graph, 0), invoked(&graph, 1));

    link(&mut graph, None, &AsmConfig::default()).unwrap();
    let (a, b) = (invoked(&graph, 0), invoked(&graph, 1));
    assert_ne!(a, b);
    assert_ne!(graph.instance(a).table, graph.instance(b).table);
    assert!(graph.instance(a).linked && graph.instance(b).linked);
    assert_eq!(graph.instance(a).lines[0].address, Some(0));
    assert_eq!(graph.instance(b).lines[0].address, Some(3));
    let line_map = &graph.prototype(0).line_to_instance;
    assert_eq!(line_map.get(&0), Some(&a));
    assert_eq!(line_map.get(&1), Some(&b));

    let mut bytes = Vec::new();
    graph.object_code(graph.root_instance(), &mut bytes);
    assert_eq!(bytes, [0x61, 0x00, 0x06, 0x61, 0x00, 0x06, 0x00, 0x00]);
}

#[test]
fn symbol_errors() {
    check("a: NOP\na: NOP\n.END", expect![[r#"
        0: ;ERROR: Symbol "a" was previously defined.
        1: ;ERROR: Symbol "a" was previously defined.
    "#]]);
    check("NOP\nBR nope\n.END", expect![[r#"
        1: ;ERROR: Symbol "nope" is undefined.
    "#]]);
    check("NOP\n@JMP\n.END", expect![[r#"
        1: ;ERROR: Symbol "target" is undefined.
    "#]]);
    check("@TWICE\n.END", expect![[r#"
        0: ;ERROR: Symbol "target" is undefined.
    "#]]);
    check(".BLOCK 0xFFFF\nNOP\n.END", expect![[r#"
        1: ;ERROR: Program requires more than 64k bytes of memory.
    "#]]);
}

#[test]
fn macro_reaches_root() {
    check("@JMP\ntarget: NOP\n.END", expect![[r#"
        0: 0000
        1: 0003
        2: 0004
        [1C, 00, 03, 07]
    "#]]);
    check("@TWICE\ntarget: NOP\n.END", expect![[r#"
        0: 0000
        1: 0006
        2: 0007
        [1C, 00, 06, 1C, 00, 06, 07]
    "#]]);
}

#[test]
fn operating_system_exports() {
    let exports = exports();
    let (_, output) = build(
        "LDWA charIn,d\n@GETC\n.END",
        ModuleType::UserProgram,
        Some(&exports),
        AsmConfig::default(),
    );
    expect![[r#"
        0: 0000
        1: 0003
        2: 0006
        [41, FC, 15, 51, FC, 15]
    "#]]
    .assert_eq(&output);

    let (_, output) = build(
        "charIn: .BLOCK 1\n.END",
        ModuleType::UserProgram,
        Some(&exports),
        AsmConfig::default(),
    );
    expect![[r#"
        0: ;ERROR: Attempted to redefine symbol "charIn", which was exported from the operating system.
    "#]]
    .assert_eq(&output);

    // Without an operating system the export simply does not exist.
    check("@GETC\n.END", expect![[r#"
        0: ;ERROR: Symbol "charIn" is undefined.
    "#]]);
}

#[test]
fn operating_system_relocation() {
    let (graph, output) = build(
        "x: .BLOCK 2\n.BURN 0xFFFF\nstart: NOP\n.WORD 0x1234\n.END",
        ModuleType::OperatingSystem,
        None,
        AsmConfig::default(),
    );
    expect![[r#"
        0: FFFB (no emit)
        1: FFFD
        2: FFFD
        3: FFFE
        4: ----
        [07, 12, 34]
    "#]]
    .assert_eq(&output);
    let burn = graph.instance(graph.root_instance()).burn;
    assert_eq!(burn.start_rom, 0xFFFD);
    assert_eq!(burn.argument, 0xFFFF);
    assert_eq!(symbol(&graph, "x"), Some(0xFFFB));
    assert_eq!(symbol(&graph, "start"), Some(0xFFFD));
}

#[test]
fn operating_system_realign() {
    let (graph, output) = build(
        "a: .BYTE 1\n.ALIGN 4\nb: .BLOCK 2\n.BURN 0xFFFF\nNOP\n.END",
        ModuleType::OperatingSystem,
        None,
        AsmConfig::default(),
    );
    expect![[r#"
        0: FFFB (no emit)
        1: FFFC (no emit)
        2: FFFD (no emit)
        3: FFFF
        4: FFFF
        5: ----
        [07]
    "#]]
    .assert_eq(&output);
    assert_eq!(symbol(&graph, "a"), Some(0xFFFB));
    assert_eq!(symbol(&graph, "b"), Some(0xFFFD));
}

#[test]
fn operating_system_aligns_after_relocation() {
    let (graph, output) = build(
        ".BURN 0xFFFF\nNOP\n.ALIGN 2\nw: .WORD 1\nNOP\n.END",
        ModuleType::OperatingSystem,
        None,
        AsmConfig::default(),
    );
    expect![[r#"
        0: FFFB
        1: FFFB
        2: FFFC
        3: FFFC
        4: FFFE
        5: FFFF
        [07, 00, 01, 07]
    "#]]
    .assert_eq(&output);
    assert_eq!(symbol(&graph, "w"), Some(0xFFFC));
    assert_eq!(graph.instance(graph.root_instance()).burn.start_rom, 0xFFFB);

    let (graph, _) = build(
        ".BURN 0xFFFF\n.BYTE 1\n.ALIGN 2\nw: .WORD 1\n.END",
        ModuleType::OperatingSystem,
        None,
        AsmConfig::default(),
    );
    assert_eq!(symbol(&graph, "w"), Some(0xFFFE));
    assert_eq!(graph.instance_length(graph.root_instance()), 3);
}

#[test]
fn burn_errors() {
    check_os(".BURN 0xFFFF\nNOP\n.BURN 0xFFFF\n.END", expect![[r#"
        2: ;ERROR: Operating systems must contain exactly 1 .BURN.
    "#]]);
    check_os("NOP\n.END", expect![[r#"
        0: ;ERROR: Operating systems must contain exactly 1 .BURN.
    "#]]);
    let forced = AsmConfig {
        force_burn_at_ffff: true,
        ..AsmConfig::default()
    };
    let (_, output) = build(
        "NOP\n.BURN 0xFC00\nNOP\n.END",
        ModuleType::OperatingSystem,
        None,
        forced,
    );
    assert_eq!(output, "1: ;ERROR: .BURN must have an argument of 0xFFFF.\n");
}
