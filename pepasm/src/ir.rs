use crate::{
    graph::InstanceId,
    isa::{AddrMode, Mnemonic},
    lex::{byte_string_length, string_value, unquote},
    symbol::{SymbolId, SymbolRef, Symbols, TableId},
    trace::TraceCommand,
};

#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Quoted source text, quotes included.
    Char(String),
    Dec(i16),
    UnsignedDec(u16),
    Hex(u16),
    /// Quoted source text, quotes included.
    Str(String),
    Symbol(SymbolId),
}

impl Argument {
    /// The 16 bit value of the argument, with symbols looked up in `table`.
    ///
    /// An unresolved symbol evaluates to zero.
    pub fn value(&self, table: TableId, symbols: &Symbols) -> u16 {
        use Argument::*;
        match self {
            Char(text) | Str(text) => string_value(text),
            Dec(v) => *v as u16,
            UnsignedDec(v) | Hex(v) => *v,
            Symbol(symbol) => symbols
                .value(SymbolRef {
                    table,
                    symbol: *symbol,
                })
                .unwrap_or_default(),
        }
    }
    pub fn render(&self, table: TableId, symbols: &Symbols) -> String {
        use Argument::*;
        match self {
            Char(text) | Str(text) => text.clone(),
            Dec(v) => v.to_string(),
            UnsignedDec(v) => v.to_string(),
            Hex(v) => format!("0x{v:04X}"),
            Symbol(symbol) => symbols.name(table, *symbol).to_owned(),
        }
    }
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Argument::Symbol(symbol) => Some(*symbol),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Unary {
        mnemonic: Mnemonic,
        breakpoint: bool,
    },
    NonUnary {
        mnemonic: Mnemonic,
        mode: AddrMode,
        arg: Argument,
        breakpoint: bool,
    },
    Addrss(Argument),
    Align {
        arg: Argument,
        padding: u16,
    },
    Ascii(Argument),
    Block(Argument),
    Burn(Argument),
    Byte(Argument),
    End,
    Equate(Argument),
    Word(Argument),
    Export(Argument),
    Scall(Argument),
    Uscall(Argument),
    CommentOnly,
    Blank,
    MacroInvoke {
        name: String,
        args: Vec<String>,
        instance: InstanceId,
    },
}

impl LineKind {
    /// The dot command spelling of a directive.
    pub fn directive(&self) -> Option<&'static str> {
        use LineKind::*;
        Some(match self {
            Addrss(_) => ".ADDRSS",
            Align { .. } => ".ALIGN",
            Ascii(_) => ".ASCII",
            Block(_) => ".BLOCK",
            Burn(_) => ".BURN",
            Byte(_) => ".BYTE",
            End => ".END",
            Equate(_) => ".EQUATE",
            Word(_) => ".WORD",
            Export(_) => ".EXPORT",
            Scall(_) => ".SCALL",
            Uscall(_) => ".USCALL",
            _ => return None,
        })
    }
    /// Comments and blank lines never carry an address.
    pub fn is_addressable(&self) -> bool {
        !matches!(self, LineKind::CommentOnly | LineKind::Blank)
    }
    pub fn argument(&self) -> Option<&Argument> {
        use LineKind::*;
        match self {
            NonUnary { arg, .. } | Align { arg, .. } => Some(arg),
            Addrss(arg) | Ascii(arg) | Block(arg) | Burn(arg) | Byte(arg) | Equate(arg)
            | Word(arg) | Export(arg) | Scall(arg) | Uscall(arg) => Some(arg),
            _ => None,
        }
    }
}

/// One assembled source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub symbol: Option<SymbolId>,
    pub comment: Option<String>,
    /// `None` until linked, and forever for lines that are not addressable.
    pub address: Option<u16>,
    /// Zero based line number inside the owning module.
    pub source_line: usize,
    pub emit: bool,
    pub trace: Vec<TraceCommand>,
}

impl Line {
    pub fn new(kind: LineKind, source_line: usize) -> Self {
        Self {
            kind,
            symbol: None,
            comment: None,
            address: None,
            source_line,
            emit: true,
            trace: Vec::new(),
        }
    }

    /// Bytes this line occupies, not counting the body of a macro invocation.
    pub fn own_length(&self, table: TableId, symbols: &Symbols) -> u16 {
        use LineKind::*;
        match &self.kind {
            Unary { .. } => 1,
            NonUnary { .. } => 3,
            Addrss(_) | Word(_) => 2,
            Byte(_) => 1,
            Align { padding, .. } => *padding,
            Ascii(Argument::Str(text)) => byte_string_length(text) as u16,
            Block(arg) => arg.value(table, symbols),
            _ => 0,
        }
    }

    /// Appends this line's object code, unless it does not emit.
    pub fn object_code(&self, table: TableId, symbols: &Symbols, out: &mut Vec<u8>) {
        use LineKind::*;
        if !self.emit {
            return;
        }
        match &self.kind {
            Unary { mnemonic, .. } => out.push(mnemonic.info().opcode),
            NonUnary {
                mnemonic,
                mode,
                arg,
                ..
            } => {
                out.push(mnemonic.specifier(*mode));
                out.extend_from_slice(&arg.value(table, symbols).to_be_bytes());
            }
            Addrss(arg) | Word(arg) => {
                out.extend_from_slice(&arg.value(table, symbols).to_be_bytes())
            }
            Byte(arg) => out.push(arg.value(table, symbols) as u8),
            Ascii(Argument::Str(text)) => out.extend(unquote(text)),
            Align { padding, .. } => out.extend(std::iter::repeat(0).take(*padding as usize)),
            Block(arg) => {
                out.extend(std::iter::repeat(0).take(arg.value(table, symbols) as usize))
            }
            _ => {}
        }
    }
}
