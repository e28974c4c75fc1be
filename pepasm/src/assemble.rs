use std::collections::VecDeque;

use crate::{
    error::{Diagnostic, LineError, Stage},
    graph::{BurnInfo, InstanceId, ModuleAssemblyGraph},
    ir::{Argument, Line, LineKind},
    isa::{AddrMode, Mnemonic},
    lex::{byte_string_length, LexError, Token, TokenBuffer, TokenKind},
    registry::{MacroRegistry, SystemCallKind},
    symbol::{SymbolId, SymbolValue, TableId},
};


pub const MAX_SYMBOL_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Invalid mnemonic.")]
    InvalidMnemonic,
    #[error("Invalid dot command.")]
    InvalidDotCommand,
    #[error("Symbol {0} cannot have more than eight characters.")]
    LongSymbol(String),
    #[error("Must have mnemonic, dot command, or macro invocation after symbol definition.")]
    UnexpectedSymbolDecl,
    #[error("Line must start with a symbol definition, mnemonic, dot command, macro invocation, or comment.")]
    UnexpectedToken,
    #[error("Comment expected following instruction.")]
    ExpectedComment,
    #[error("Unexpected macro substitution {0}.")]
    MacroSubstitution(String),
    #[error("Operand specifier expected after mnemonic.")]
    OperandExpected,
    #[error("Addressing mode required for this instruction.")]
    AddrModeRequired,
    #[error("Illegal addressing mode for this instruction.")]
    IllegalAddrMode,
    #[error("Hexadecimal constant is out of range (0x0000..0xFFFF).")]
    HexRange,
    #[error("Decimal constant is out of range (-32768..65535).")]
    DecRange,
    #[error("Decimal constant is out of range (0..65535).")]
    UnsignedDecRange,
    #[error("Decimal constant is out of byte range (-128..255).")]
    ByteDecRange,
    #[error("Hex constant is out of byte range (0x00..0xFF).")]
    ByteHexRange,
    #[error("String operands must have length at most two.")]
    StringTooLong,
    #[error("Byte string operands must have length one.")]
    ByteStringLength,
    #[error(".END directive may not define a symbol.")]
    EndWithSymbol,
    #[error("Only a comment can follow .END.")]
    AfterEnd,
    #[error("Missing .END sentinel.")]
    MissingEnd,
    #[error(".EQUATE must have a symbol definition.")]
    EquateWithoutSymbol,
    #[error(".EQUATE requires a dec, hex, or string constant argument.")]
    EquateArgument,
    #[error(".WORD requires a char, dec, hex, or string constant argument.")]
    WordArgument,
    #[error(".BYTE requires a char, dec, hex, or string constant argument.")]
    ByteArgument,
    #[error(".BLOCK requires a decimal or hex constant argument.")]
    BlockArgument,
    #[error(".BURN requires a hex constant argument.")]
    BurnArgument,
    #[error(".ALIGN requires a decimal constant 2, 4, or 8.")]
    AlignArgument,
    #[error(".ASCII requires a string constant argument.")]
    AsciiArgument,
    #[error("{0} requires a symbol argument.")]
    SymbolArgument(&'static str),
    #[error("{0} must not have a symbol definition.")]
    UnexpectedSymbolDef(&'static str),
    #[error("{0} is only allowed in an operating system.")]
    OnlyInOperatingSystem(&'static str),
    #[error("Failed to register system call.")]
    SystemCallRegistration,
    #[error("Referenced macro does not exist.")]
    NoSuchMacro,
    #[error("Macro supplied wrong number of arguments.")]
    BadArgCount,
    #[error("No preprocessed instance of macro {0} matches its arguments.")]
    MissingInstance(String),
}

/// Assembles every instance reachable from the root, breadth first.
///
/// The first error in any instance stops assembly.
pub fn assemble(
    graph: &mut ModuleAssemblyGraph,
    registry: &mut MacroRegistry,
) -> Result<(), Vec<LineError>> {
    let mut queue = VecDeque::from([graph.root_instance()]);
    while let Some(id) = queue.pop_front() {
        if graph.instance(id).assembled {
            continue;
        }
        let source = graph.instance_source(id);
        let line_count = source.len();
        let mut assembler = Assembler {
            table: graph.instance(id).table,
            is_os: graph.is_os(),
            graph: &mut *graph,
            registry: &mut *registry,
            buf: TokenBuffer::new(source),
            burn: BurnInfo::default(),
            line_count,
        };
        let result = assembler.run();
        let burn = assembler.burn;
        match result {
            Ok(lines) => {
                queue.extend(lines.iter().filter_map(|line| match &line.kind {
                    LineKind::MacroInvoke { instance, .. } => Some(*instance),
                    _ => None,
                }));
                let instance = graph.instance_mut(id);
                instance.lines = lines;
                instance.burn = burn;
                instance.assembled = true;
                tracing::debug!("assembled instance {}", id.0);
            }
            Err((line, error)) => {
                let diagnostic = Diagnostic::error(Stage::FrontEnd, error);
                graph.errors.add(id, line, diagnostic.clone());
                return Err(vec![LineError::new(graph.attribute(id, line), diagnostic)]);
            }
        }
    }
    Ok(())
}

struct Assembler<'a> {
    graph: &'a mut ModuleAssemblyGraph,
    registry: &'a mut MacroRegistry,
    table: TableId,
    is_os: bool,
    buf: TokenBuffer,
    burn: BurnInfo,
    line_count: usize,
}

impl Assembler<'_> {
    fn run(&mut self) -> Result<Vec<Line>, (usize, AssembleError)> {
        let mut lines = Vec::new();
        while self.buf.input_remains() {
            let n = self.buf.lines_read().saturating_sub(1);
            let line = self.line(n).map_err(|e| (n, e))?;
            let end = line.kind == LineKind::End;
            lines.push(line);
            if end {
                return Ok(lines);
            }
        }
        Err((self.line_count, AssembleError::MissingEnd))
    }

    fn next(&mut self) -> Result<Token, AssembleError> {
        let kind = self
            .buf
            .peek()
            .map(|t| t.kind)
            .ok_or(AssembleError::MissingEnd)?;
        if let TokenKind::Error(e) = kind {
            return Err(e.into());
        }
        self.buf.match_kind(kind);
        self.buf.take_last_match().ok_or(AssembleError::MissingEnd)
    }

    fn line(&mut self, n: usize) -> Result<Line, AssembleError> {
        use TokenKind::*;
        let mut token = self.next()?;
        let mut symbol = None;
        match token.kind {
            Empty => return Ok(Line::new(LineKind::Blank, n)),
            Comment => {
                self.end_of_line(AssembleError::ExpectedComment)?;
                let mut line = Line::new(LineKind::CommentOnly, n);
                line.comment = Some(token.text);
                return Ok(line);
            }
            SymbolDef => {
                check_symbol_length(&token.text)?;
                let name = self.graph.symbols.intern(&token.text);
                symbol = Some(self.graph.symbols.table_mut(self.table).define(name));
                token = self.next()?;
                if !matches!(token.kind, Identifier | DotCommand | MacroInvoke) {
                    return Err(AssembleError::UnexpectedSymbolDecl);
                }
            }
            _ => {}
        }
        let kind = match token.kind {
            Identifier => self.instruction(&token.text)?,
            DotCommand => self.directive(&token.text, symbol)?,
            MacroInvoke => self.macro_invoke(&token.text)?,
            MacroSubstitution => return Err(AssembleError::MacroSubstitution(token.text)),
            _ => return Err(AssembleError::UnexpectedToken),
        };
        let trailing = if kind == LineKind::End {
            AssembleError::AfterEnd
        } else {
            AssembleError::ExpectedComment
        };
        let mut line = Line::new(kind, n);
        line.symbol = symbol;
        if self.buf.lookahead(Comment) {
            line.comment = Some(self.next()?.text);
        }
        self.end_of_line(trailing)?;
        Ok(line)
    }

    fn end_of_line(&mut self, otherwise: AssembleError) -> Result<(), AssembleError> {
        match self.next()?.kind {
            TokenKind::Empty => Ok(()),
            _ => Err(otherwise),
        }
    }

    fn reference(&mut self, name: &str) -> Result<SymbolId, AssembleError> {
        check_symbol_length(name)?;
        let name = self.graph.symbols.intern(name);
        Ok(self.graph.symbols.table_mut(self.table).reference(name))
    }

    fn instruction(&mut self, name: &str) -> Result<LineKind, AssembleError> {
        let mnemonic = Mnemonic::from_name(name).ok_or(AssembleError::InvalidMnemonic)?;
        if mnemonic.is_unary() {
            return Ok(LineKind::Unary {
                mnemonic,
                breakpoint: false,
            });
        }
        let arg = self.operand()?;
        let mode = if self.buf.lookahead(TokenKind::AddrMode) {
            let token = self.next()?;
            let mode = AddrMode::from_name(&token.text).ok_or(LexError::AddrMode)?;
            if !mnemonic.allows(mode) {
                return Err(AssembleError::IllegalAddrMode);
            }
            mode
        } else if mnemonic.info().mode_required {
            return Err(AssembleError::AddrModeRequired);
        } else {
            AddrMode::I
        };
        Ok(LineKind::NonUnary {
            mnemonic,
            mode,
            arg,
            breakpoint: false,
        })
    }

    fn operand(&mut self) -> Result<Argument, AssembleError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Identifier => Ok(Argument::Symbol(self.reference(&token.text)?)),
            TokenKind::MacroSubstitution => Err(AssembleError::MacroSubstitution(token.text)),
            _ => word_argument(token)?.ok_or(AssembleError::OperandExpected),
        }
    }

    fn directive(
        &mut self,
        name: &str,
        symbol: Option<SymbolId>,
    ) -> Result<LineKind, AssembleError> {
        use TokenKind::*;
        let dot = name.to_ascii_uppercase();
        if dot == "END" {
            return match symbol {
                Some(_) => Err(AssembleError::EndWithSymbol),
                None => Ok(LineKind::End),
            };
        }
        if let Some((directive, call)) = match dot.as_str() {
            "EXPORT" => Some((".EXPORT", None)),
            "SCALL" => Some((".SCALL", Some(SystemCallKind::NonUnary))),
            "USCALL" => Some((".USCALL", Some(SystemCallKind::Unary))),
            _ => None,
        } {
            return self.system_symbol(directive, call, symbol);
        }
        if dot == "BURN" && !self.is_os {
            return Err(AssembleError::OnlyInOperatingSystem(".BURN"));
        }
        let token = self.next()?;
        Ok(match (dot.as_str(), token.kind) {
            ("ADDRSS", Identifier) => LineKind::Addrss(Argument::Symbol(self.reference(&token.text)?)),
            ("ADDRSS", _) => return Err(AssembleError::SymbolArgument(".ADDRSS")),
            ("ALIGN", DecConstant) => match token.text.parse::<u16>() {
                Ok(n @ (2 | 4 | 8)) => LineKind::Align {
                    arg: Argument::UnsignedDec(n),
                    padding: 0,
                },
                _ => return Err(AssembleError::AlignArgument),
            },
            ("ALIGN", _) => return Err(AssembleError::AlignArgument),
            ("ASCII", StringConstant) => LineKind::Ascii(Argument::Str(token.text)),
            ("ASCII", _) => return Err(AssembleError::AsciiArgument),
            ("BLOCK", DecConstant) => match dec_value(&token.text) {
                Some(v @ 0..=0xFFFF) => LineKind::Block(Argument::UnsignedDec(v as u16)),
                _ => return Err(AssembleError::UnsignedDecRange),
            },
            ("BLOCK", HexConstant) => LineKind::Block(Argument::Hex(hex_value(&token.text)?)),
            ("BLOCK", _) => return Err(AssembleError::BlockArgument),
            ("BURN", HexConstant) => {
                let value = hex_value(&token.text)?;
                self.burn.count += 1;
                self.burn.argument = value;
                LineKind::Burn(Argument::Hex(value))
            }
            ("BURN", _) => return Err(AssembleError::BurnArgument),
            ("BYTE", CharConstant) => LineKind::Byte(Argument::Char(token.text)),
            ("BYTE", DecConstant) => match dec_value(&token.text) {
                Some(v @ -128..=-1) => LineKind::Byte(Argument::Dec(v as i16)),
                Some(v @ 0..=255) => LineKind::Byte(Argument::UnsignedDec(v as u16)),
                _ => return Err(AssembleError::ByteDecRange),
            },
            ("BYTE", HexConstant) => match hex_value(&token.text) {
                Ok(v @ 0..=0xFF) => LineKind::Byte(Argument::Hex(v)),
                _ => return Err(AssembleError::ByteHexRange),
            },
            ("BYTE", StringConstant) if byte_string_length(&token.text) == 1 => {
                LineKind::Byte(Argument::Str(token.text))
            }
            ("BYTE", StringConstant) => return Err(AssembleError::ByteStringLength),
            ("BYTE", _) => return Err(AssembleError::ByteArgument),
            ("EQUATE", _) => {
                let symbol = symbol.ok_or(AssembleError::EquateWithoutSymbol)?;
                let arg = word_argument(token)?.ok_or(AssembleError::EquateArgument)?;
                let value = arg.value(self.table, &self.graph.symbols);
                self.graph
                    .symbols
                    .table_mut(self.table)
                    .set_value(symbol, SymbolValue::Numeric(value));
                LineKind::Equate(arg)
            }
            ("WORD", _) => LineKind::Word(word_argument(token)?.ok_or(AssembleError::WordArgument)?),
            _ => return Err(AssembleError::InvalidDotCommand),
        })
    }

    /// `.EXPORT`, `.SCALL` and `.USCALL`, which all name a symbol of the operating system.
    fn system_symbol(
        &mut self,
        directive: &'static str,
        call: Option<SystemCallKind>,
        symbol: Option<SymbolId>,
    ) -> Result<LineKind, AssembleError> {
        if !self.is_os {
            return Err(AssembleError::OnlyInOperatingSystem(directive));
        }
        if symbol.is_some() {
            return Err(AssembleError::UnexpectedSymbolDef(directive));
        }
        let token = self.next()?;
        if token.kind != TokenKind::Identifier {
            return Err(AssembleError::SymbolArgument(directive));
        }
        let id = self.reference(&token.text)?;
        self.graph
            .symbols
            .table_mut(self.table)
            .entry_mut(id)
            .exported = true;
        let arg = Argument::Symbol(id);
        Ok(match call {
            None => LineKind::Export(arg),
            Some(kind) => {
                if !self.registry.register_system_call(kind, &token.text) {
                    return Err(AssembleError::SystemCallRegistration);
                }
                match kind {
                    SystemCallKind::NonUnary => LineKind::Scall(arg),
                    SystemCallKind::Unary => LineKind::Uscall(arg),
                }
            }
        })
    }

    fn macro_invoke(&mut self, name: &str) -> Result<LineKind, AssembleError> {
        use TokenKind::*;
        let mut args = Vec::new();
        while self
            .buf
            .match_one_of(&[Identifier, HexConstant, DecConstant, CharConstant, StringConstant])
        {
            if let Some(token) = self.buf.take_last_match() {
                args.push(token.text);
            }
        }
        if let Some(token) = self.buf.peek() {
            if token.kind == MacroSubstitution {
                return Err(AssembleError::MacroSubstitution(token.text.clone()));
            }
        }
        let found = self
            .registry
            .get_macro(name)
            .ok_or(AssembleError::NoSuchMacro)?;
        if found.arg_count as usize != args.len() {
            return Err(AssembleError::BadArgCount);
        }
        let name = found.name.clone();
        let instance = self.find_instance(&name, &args)?;
        Ok(LineKind::MacroInvoke {
            name,
            args,
            instance,
        })
    }

    fn find_instance(&self, name: &str, args: &[String]) -> Result<InstanceId, AssembleError> {
        let missing = || AssembleError::MissingInstance(name.to_owned());
        let prototype = self.graph.prototype_index(name).ok_or_else(missing)?;
        self.graph.find_instance(prototype, args).ok_or_else(missing)
    }
}

fn check_symbol_length(name: &str) -> Result<(), AssembleError> {
    if name.len() > MAX_SYMBOL_LENGTH {
        return Err(AssembleError::LongSymbol(name.to_owned()));
    }
    Ok(())
}

/// Arguments accepted wherever a 16 bit constant is: char, dec, hex and short strings.
fn word_argument(token: Token) -> Result<Option<Argument>, AssembleError> {
    Ok(Some(match token.kind {
        TokenKind::CharConstant => Argument::Char(token.text),
        TokenKind::DecConstant => match dec_value(&token.text) {
            Some(v @ -32768..=-1) => Argument::Dec(v as i16),
            Some(v @ 0..=0xFFFF) => Argument::UnsignedDec(v as u16),
            _ => return Err(AssembleError::DecRange),
        },
        TokenKind::HexConstant => Argument::Hex(hex_value(&token.text)?),
        TokenKind::StringConstant => {
            if byte_string_length(&token.text) > 2 {
                return Err(AssembleError::StringTooLong);
            }
            Argument::Str(token.text)
        }
        _ => return Ok(None),
    }))
}

fn dec_value(text: &str) -> Option<i64> {
    text.parse().ok()
}

fn hex_value(text: &str) -> Result<u16, AssembleError> {
    let digits = text[2..].trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    u16::from_str_radix(digits, 16).map_err(|_| AssembleError::HexRange)
}
