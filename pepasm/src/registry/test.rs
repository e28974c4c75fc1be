use expect_test::{expect, Expect};

use super::{parse_header, MacroKind, MacroRegistry, SystemCallKind};

fn check(registry: &MacroRegistry, expect: Expect) {
    let output = [MacroKind::Core, MacroKind::System, MacroKind::User]
        .into_iter()
        .flat_map(|kind| registry.get_macros(kind))
        .map(|m| format!("{:?} {} {}\n", m.kind, m.name, m.arg_count))
        .collect::<String>();
    expect.assert_eq(&output);
}

#[test]
fn headers() {
    assert_eq!(parse_header("@DECI 2\nbody"), Some(("DECI", 2)));
    assert_eq!(parse_header("  @asra2 0  "), Some(("asra2", 0)));
    assert_eq!(parse_header("DECI 2"), None);
    assert_eq!(parse_header("@DECI"), None);
    assert_eq!(parse_header("@DECI two"), None);
    assert_eq!(parse_header("@DECI 2 3"), None);
    assert_eq!(parse_header("@2DECI 2"), None);
    assert_eq!(parse_header(""), None);
}

#[test]
fn register() {
    let mut registry = MacroRegistry::new();
    assert!(registry.register_core_macro("ASRA2", "@ASRA2 0\nASRA\nASRA\n.END\n"));
    assert!(registry.register_custom_macro("pushw", "@PUSHW 1\nSUBSP 2,i\n.END\n"));
    // Same name, different case.
    assert!(!registry.register_custom_macro("asra2", "@asra2 0\n.END\n"));
    // Header names another macro.
    assert!(!registry.register_custom_macro("foo", "@bar 0\n.END\n"));
    // Missing header.
    assert!(!registry.register_custom_macro("baz", "NOP\n.END\n"));
    assert!(registry.register_system_call(SystemCallKind::NonUnary, "DECI"));
    assert!(registry.register_system_call(SystemCallKind::Unary, "STRO"));
    assert!(!registry.register_system_call(SystemCallKind::Unary, "pushw"));

    assert!(registry.has_macro("Pushw"));
    assert_eq!(registry.get_macro("deci").map(|m| m.arg_count), Some(2));
    assert_eq!(
        registry.get_macro("STRO").map(|m| m.body()),
        Some("LDWT STRO, i\nUSCALL\n.END\n")
    );
    check(
        &registry,
        expect![[r#"
            Core ASRA2 0
            System DECI 2
            System STRO 0
            User pushw 1
        "#]],
    );

    registry.clear_system_calls();
    assert!(!registry.has_macro("DECI"));
    check(
        &registry,
        expect![[r#"
            Core ASRA2 0
            User pushw 1
        "#]],
    );
}
