use super::{SymbolRef, SymbolValue, Symbols};

#[test]
fn define_and_redefine() {
    let mut symbols = Symbols::default();
    let t = symbols.new_table();
    let main = symbols.intern("main");
    let loop_ = symbols.intern("loop");

    let r = symbols.table_mut(t).reference(loop_);
    assert!(!symbols.table(t).entry(r).defined);
    let d = symbols.table_mut(t).define(loop_);
    assert_eq!(r, d);
    assert!(symbols.table(t).entry(d).defined);
    assert!(!symbols.table(t).entry(d).multiply_defined);

    symbols.table_mut(t).define(main);
    let again = symbols.table_mut(t).define(main);
    assert!(symbols.table(t).entry(again).multiply_defined);
    assert_eq!(symbols.lookup(t, "main"), Some(again));
    assert_eq!(symbols.lookup(t, "nope"), None);
    assert_eq!(symbols.name(t, again), "main");
}

#[test]
fn values() {
    let mut symbols = Symbols::default();
    let os = symbols.new_table();
    let user = symbols.new_table();
    let name = symbols.intern("charIn");

    let exported = symbols.table_mut(os).define(name);
    symbols.table_mut(os).set_value(
        exported,
        SymbolValue::Location {
            base: 0x10,
            offset: 0,
        },
    );
    let imported = symbols.table_mut(user).define(name);
    let target = SymbolRef {
        table: os,
        symbol: exported,
    };
    symbols
        .table_mut(user)
        .set_value(imported, SymbolValue::External(target));
    let at_user = SymbolRef {
        table: user,
        symbol: imported,
    };
    assert_eq!(symbols.value(at_user), Some(0x10));

    symbols.table_mut(os).set_value(
        exported,
        SymbolValue::Location {
            base: 0xFC10,
            offset: 2,
        },
    );
    assert_eq!(symbols.value(at_user), Some(0xFC12));
    assert_eq!(symbols.value(target), Some(0xFC12));

    let copy = symbols.clone_table(os);
    symbols.table_mut(copy).set_value(exported, SymbolValue::Numeric(7));
    assert_eq!(symbols.value(target), Some(0xFC12));
    assert_eq!(
        symbols.value(SymbolRef {
            table: copy,
            symbol: exported
        }),
        Some(7)
    );
}

#[test]
fn broken_chain() {
    let mut symbols = Symbols::default();
    let t = symbols.new_table();
    let a = symbols.intern("a");
    let id = symbols.table_mut(t).define(a);
    let at = SymbolRef { table: t, symbol: id };
    assert_eq!(symbols.value(at), None);
    symbols.table_mut(t).set_value(id, SymbolValue::External(at));
    assert_eq!(symbols.value(at), None);
}
