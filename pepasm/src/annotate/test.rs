use expect_test::{expect, Expect};

use super::{annotate, AnnotationResult, AnnotationStatus};
use crate::{
    assemble::assemble,
    config::AsmConfig,
    graph::{ModuleAssemblyGraph, ModuleType},
    link::link,
    preprocess::preprocess,
    registry::MacroRegistry,
    trace::{FrameTarget, SymbolFormat, TraceAction, TraceTarget, TraceType},
};

fn run(src: &str) -> (ModuleAssemblyGraph, AnnotationResult) {
    let mut registry = MacroRegistry::new();
    registry.register_core_macro("PUSH2", "@PUSH2 0\nSUBSP 2,i ;#2d\n.END\n");
    registry.register_core_macro("BARE", "@BARE 0\nSUBSP 2,i\n.END\n");
    let mut graph = ModuleAssemblyGraph::new(src, ModuleType::UserProgram);
    preprocess(&mut graph, &registry).unwrap();
    assemble(&mut graph, &mut registry).unwrap();
    link(&mut graph, None, &AsmConfig::default()).unwrap();
    let result = annotate(&mut graph);
    (graph, result)
}

fn check(src: &str, expect: Expect) {
    let (_, result) = run(src);
    let output = result
        .errors
        .iter()
        .chain(&result.warnings)
        .map(|e| format!("{}: {}\n", e.line, e.diagnostic))
        .collect::<String>();
    expect.assert_eq(&format!("{:?}\n{output}", result.status));
}

fn commands(graph: &ModuleAssemblyGraph, line: usize) -> Vec<(TraceAction, FrameTarget, TraceTarget, u16)> {
    graph.instance(graph.root_instance()).lines[line]
        .trace
        .iter()
        .map(|c| (c.action, c.frame, c.target, c.ty.as_ref().map_or(0, TraceType::size)))
        .collect()
}

#[test]
fn untagged() {
    let (graph, result) = run("SUBSP 2,i\nCALL f\nf: RET\n.END");
    assert!(!result.had_trace_tags);
    assert_eq!(result.status, AnnotationStatus::Success);
    assert!(commands(&graph, 1).is_empty());
}

#[test]
fn hash_words_in_prose() {
    let (graph, result) = run("SUBSP 2,i\nNOP ;item #1 here\nADDSP 2,i\n.END");
    assert!(!result.had_trace_tags);
    assert_eq!(result.status, AnnotationStatus::Success);
    assert!(result.warnings.is_empty() && result.errors.is_empty());
    assert!(commands(&graph, 1).is_empty());
}

#[test]
fn stack_frames() {
    let (graph, result) = run(
        "node: .EQUATE 0 ;#next #data\n\
         next: .EQUATE 0 ;#2h\n\
         data: .EQUATE 2 ;#2d\n\
         g: .BLOCK 4 ;#node\n\
         main: SUBSP 4,i ;#node @locals\n\
         CALL fn\n\
         ADDSP 4,i ;#node\n\
         fn: RET\n\
         .END",
    );
    assert!(result.had_trace_tags);
    assert_eq!(result.status, AnnotationStatus::Success);
    assert!(result.warnings.is_empty() && result.errors.is_empty());

    use crate::trace::{FrameTarget as F, TraceAction as A, TraceTarget as T};
    assert_eq!(commands(&graph, 3), [(A::Push, F::None, T::Globals, 4)]);
    assert_eq!(commands(&graph, 4), [(A::Push, F::Current, T::Stack, 4)]);
    assert_eq!(
        commands(&graph, 5),
        [(A::Push, F::Next, T::Stack, 2), (A::SetFrame, F::Next, T::Stack, 0)]
    );
    assert_eq!(commands(&graph, 6), [(A::Pop, F::Deduced, T::Stack, 4)]);
    assert_eq!(
        commands(&graph, 7),
        [(A::Pop, F::Current, T::Stack, 2), (A::SetFrame, F::Previous, T::Stack, 0)]
    );

    let pushed = graph.instance(graph.root_instance()).lines[4].trace[0].ty.clone();
    let Some(TraceType::Struct { name, fields }) = pushed else {
        panic!("expected a struct");
    };
    assert_eq!(name, "node");
    assert_eq!(
        fields,
        [
            TraceType::Primitive {
                name: "next".to_owned(),
                format: SymbolFormat::F2H
            },
            TraceType::Primitive {
                name: "data".to_owned(),
                format: SymbolFormat::F2D
            },
        ]
    );
}

#[test]
fn traps_and_heap() {
    let (graph, result) = run(
        "x: .WORD 0 ;#2d\nSCALL 0,i\nCALL malloc ;#2d4a\nMOVASP\nSRET\nmalloc: RET\n.END",
    );
    assert_eq!(result.status, AnnotationStatus::Success);
    use crate::trace::{FrameTarget as F, TraceAction as A, TraceTarget as T};
    assert_eq!(
        commands(&graph, 1),
        [
            (A::Push, F::Current, T::Stack, 12),
            (A::SwapTrace, F::None, T::Swap, 0),
            (A::SetFrame, F::Next, T::Stack, 0),
        ]
    );
    assert_eq!(commands(&graph, 2)[2], (A::Push, F::None, T::Heap, 8));
    assert_eq!(commands(&graph, 3), [(A::SwapTrace, F::None, T::Swap, 0)]);
    assert_eq!(
        commands(&graph, 4),
        [(A::Pop, F::Current, T::Stack, 12), (A::SwapTrace, F::None, T::Swap, 0)]
    );
}

#[test]
fn diagnostics() {
    check(
        "x: .BLOCK 2 ;#2d\nSUBSP 2,i\nADDSP 4,i ;#2d\n.END",
        expect![[r#"
            Failure
            1: ;ERROR: SUBSP must carry trace tags once the program uses them.
            2: ;ERROR: Trace tags total 2 bytes, but the instruction allocates 4.
        "#]],
    );
    check(
        "s: .EQUATE 0 ;#ghost\nSUBSP 2,i ;#missing #3x\nADDSP 2,i ;#2d @params\n.END",
        expect![[r#"
            SuccessWithWarnings
            0: ;WARNING: Could not resolve trace tag #ghost.
            1: ;WARNING: Malformed trace tag #3x.
            1: ;WARNING: Could not resolve trace tag #missing.
        "#]],
    );
    // Tags inside a macro body count against the line that invokes it.
    check(
        "x: .WORD 0 ;#2d\n@PUSH2\n@BARE\nADDSP 2,i ;#2d\n.END",
        expect![[r#"
            Failure
            2: ;ERROR: SUBSP must carry trace tags once the program uses them.
        "#]],
    );
}
