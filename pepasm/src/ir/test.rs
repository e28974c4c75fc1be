use super::{Argument, Line, LineKind};
use crate::{
    isa::{AddrMode, Mnemonic},
    symbol::{SymbolValue, Symbols},
};

fn bytes(line: &Line, symbols: &Symbols, table: crate::symbol::TableId) -> Vec<u8> {
    let mut out = Vec::new();
    line.object_code(table, symbols, &mut out);
    out
}

#[test]
fn instructions() {
    let mut symbols = Symbols::default();
    let t = symbols.new_table();
    let name = symbols.intern("num");
    let num = symbols.table_mut(t).define(name);
    symbols.table_mut(t).set_value(num, SymbolValue::Numeric(0x1234));

    let asla = Line::new(
        LineKind::Unary {
            mnemonic: Mnemonic::Asla,
            breakpoint: false,
        },
        0,
    );
    assert_eq!(asla.own_length(t, &symbols), 1);
    assert_eq!(bytes(&asla, &symbols, t), [0x14]);

    let ldwa = Line::new(
        LineKind::NonUnary {
            mnemonic: Mnemonic::Ldwa,
            mode: AddrMode::SFX,
            arg: Argument::Symbol(num),
            breakpoint: false,
        },
        1,
    );
    assert_eq!(ldwa.own_length(t, &symbols), 3);
    assert_eq!(bytes(&ldwa, &symbols, t), [0x47, 0x12, 0x34]);

    let br = Line::new(
        LineKind::NonUnary {
            mnemonic: Mnemonic::Br,
            mode: AddrMode::X,
            arg: Argument::Dec(-1),
            breakpoint: false,
        },
        2,
    );
    assert_eq!(bytes(&br, &symbols, t), [0x1D, 0xFF, 0xFF]);
}

#[test]
fn directives() {
    let mut symbols = Symbols::default();
    let t = symbols.new_table();

    let block = Line::new(LineKind::Block(Argument::UnsignedDec(5)), 0);
    assert_eq!(block.own_length(t, &symbols), 5);
    assert_eq!(bytes(&block, &symbols, t), [0; 5]);

    let ascii = Line::new(LineKind::Ascii(Argument::Str(r#""a\n\x00""#.to_owned())), 0);
    assert_eq!(ascii.own_length(t, &symbols), 3);
    assert_eq!(bytes(&ascii, &symbols, t), [b'a', 10, 0]);

    let byte = Line::new(LineKind::Byte(Argument::Dec(-128)), 0);
    assert_eq!(bytes(&byte, &symbols, t), [0x80]);

    let word = Line::new(LineKind::Word(Argument::Char("'A'".to_owned())), 0);
    assert_eq!(bytes(&word, &symbols, t), [0x00, 0x41]);

    let align = Line::new(
        LineKind::Align {
            arg: Argument::UnsignedDec(4),
            padding: 3,
        },
        0,
    );
    assert_eq!(align.own_length(t, &symbols), 3);
    assert_eq!(bytes(&align, &symbols, t), [0; 3]);

    let equate = Line::new(LineKind::Equate(Argument::Hex(0xFFFF)), 0);
    assert_eq!(equate.own_length(t, &symbols), 0);
    assert!(bytes(&equate, &symbols, t).is_empty());

    let mut silent = Line::new(LineKind::Word(Argument::Hex(0xBEEF)), 0);
    silent.emit = false;
    assert_eq!(silent.own_length(t, &symbols), 2);
    assert!(bytes(&silent, &symbols, t).is_empty());
}

#[test]
fn rendering() {
    let mut symbols = Symbols::default();
    let t = symbols.new_table();
    let name = symbols.intern("charIn");
    let id = symbols.table_mut(t).reference(name);
    assert_eq!(Argument::Hex(0xfc15).render(t, &symbols), "0xFC15");
    assert_eq!(Argument::Dec(-5).render(t, &symbols), "-5");
    assert_eq!(Argument::UnsignedDec(65535).render(t, &symbols), "65535");
    assert_eq!(Argument::Symbol(id).render(t, &symbols), "charIn");
    assert_eq!(Argument::Symbol(id).value(t, &symbols), 0);
}
