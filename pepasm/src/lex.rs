use std::collections::VecDeque;


mod private;

use private::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    AddrMode,
    CharConstant,
    Comment,
    DecConstant,
    DotCommand,
    HexConstant,
    Identifier,
    SymbolDef,
    StringConstant,
    MacroInvoke,
    MacroSubstitution,
    Empty,
    Error(LexError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum LexError {
    #[error("Malformed addressing mode.")]
    AddrMode,
    #[error("Malformed character constant.")]
    CharConstant,
    #[error("Malformed decimal constant.")]
    DecConstant,
    #[error("Malformed dot command.")]
    DotCommand,
    #[error("Malformed hex constant.")]
    HexConstant,
    #[error("Malformed string constant.")]
    StringConstant,
    #[error("Malformed macro invocation.")]
    MacroInvoke,
    #[error("Malformed macro substitution.")]
    MacroSubstitution,
    #[error("Syntax error.")]
    Syntax,
}

/// One classified piece of a line.
///
/// `text` is the source text with framing removed where the framing is not part of the value:
/// no `@` on macro invocations, no `.` on dot commands, no `:` on symbol definitions and no
/// leading comma on addressing modes. Constants and comments keep their full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Tokenizes a single line.
///
/// Every well formed line ends with a [`TokenKind::Empty`] token. A line that fails to lex
/// yields exactly one error token.
pub fn tokenize_line(line: &str) -> Vec<Token> {
    let mut cursor = Cursor::new(line.trim());
    let mut tokens = Vec::new();
    let mut after_macro = false;
    loop {
        cursor.eat_while(char::is_whitespace);
        if cursor.is_eof() {
            tokens.push(Token::new(TokenKind::Empty, ""));
            return tokens;
        }
        if after_macro && cursor.first() == ',' {
            cursor.bump();
            continue;
        }
        match cursor.token() {
            Ok(token) => {
                after_macro |= token.kind == TokenKind::MacroInvoke;
                tokens.push(token);
            }
            Err(e) => return vec![Token::new(TokenKind::Error(e), cursor.rest())],
        }
    }
}

impl Cursor<'_> {
    fn token(&mut self) -> Result<Token, LexError> {
        use TokenKind::*;
        let start = self.pos();
        let first = self.first();
        let kind = match first {
            '$' => {
                self.bump();
                if !self.eat_while(|c| c.is_ascii_digit()) {
                    return Err(LexError::MacroSubstitution);
                }
                MacroSubstitution
            }
            '@' => {
                self.bump();
                if !is_id_start(self.first()) {
                    return Err(LexError::MacroInvoke);
                }
                self.eat_while(is_id_continue);
                if !(self.is_eof() || self.first().is_whitespace() || self.first() == ';') {
                    return Err(LexError::MacroInvoke);
                }
                return Ok(Token::new(MacroInvoke, &self.slice(start)[1..]));
            }
            ',' => {
                self.bump();
                self.eat_while(char::is_whitespace);
                let mode_start = self.pos();
                self.addr_mode()?;
                let mode = self.slice(mode_start).to_owned();
                self.eat_while(char::is_whitespace);
                return Ok(Token::new(AddrMode, mode));
            }
            '\'' => {
                self.bump();
                let byte = self.first() != '\'' && self.first().is_ascii();
                if !byte || !self.quoted_char() || self.bump() != Some('\'') {
                    return Err(LexError::CharConstant);
                }
                CharConstant
            }
            ';' => {
                let comment = self.rest().to_owned();
                self.eat_while(|_| true);
                return Ok(Token::new(Comment, comment));
            }
            '0' if matches!(self.second(), 'x' | 'X') => {
                self.bump();
                self.bump();
                if !self.eat_while(|c| c.is_ascii_hexdigit()) {
                    return Err(LexError::HexConstant);
                }
                HexConstant
            }
            '0'..='9' | '+' | '-' => {
                if matches!(first, '+' | '-') {
                    self.bump();
                }
                if !self.eat_while(|c| c.is_ascii_digit()) {
                    return Err(LexError::DecConstant);
                }
                DecConstant
            }
            '.' => {
                self.bump();
                if !self.first().is_ascii_alphabetic() {
                    return Err(LexError::DotCommand);
                }
                self.eat_while(is_id_continue);
                return Ok(Token::new(DotCommand, &self.slice(start)[1..]));
            }
            _ if is_id_start(first) => {
                self.eat_while(is_id_continue);
                let name = self.slice(start).to_owned();
                if self.first() == ':' {
                    self.bump();
                    return Ok(Token::new(SymbolDef, name));
                }
                return Ok(Token::new(Identifier, name));
            }
            '"' => {
                self.bump();
                loop {
                    match self.first() {
                        '"' => {
                            self.bump();
                            break;
                        }
                        _ if self.is_eof() => return Err(LexError::StringConstant),
                        _ => {
                            if !self.quoted_char() {
                                return Err(LexError::StringConstant);
                            }
                        }
                    }
                }
                StringConstant
            }
            _ => return Err(LexError::Syntax),
        };
        Ok(Token::new(kind, self.slice(start)))
    }

    /// Consumes one plain or escaped character inside a char or string constant.
    fn quoted_char(&mut self) -> bool {
        match self.bump() {
            Some('\\') => match self.bump() {
                Some('\'' | '"' | '\\' | 'b' | 'f' | 'n' | 'r' | 't' | 'v') => true,
                Some('x' | 'X') => {
                    self.bump().is_some_and(|c| c.is_ascii_hexdigit())
                        && self.bump().is_some_and(|c| c.is_ascii_hexdigit())
                }
                _ => false,
            },
            Some(_) => true,
            None => false,
        }
    }

    fn addr_mode(&mut self) -> Result<(), LexError> {
        let (a, b, c) = (
            self.first().to_ascii_lowercase(),
            self.second().to_ascii_lowercase(),
            self.third().to_ascii_lowercase(),
        );
        let len = match (a, b, c) {
            ('s', 'f', 'x') => 3,
            ('s', 'f', _) | ('s', 'x', _) if !matches!((b, c), ('x', 'f')) => 2,
            ('s', 'f' | 'x', _) => return Err(LexError::AddrMode),
            ('s' | 'i' | 'd' | 'x' | 'n', _, _) => 1,
            _ => return Err(LexError::AddrMode),
        };
        for _ in 0..len {
            self.bump();
        }
        Ok(())
    }
}

fn is_id_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}
fn is_id_continue(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '0'..='9')
}

/// Replaces every `$k` with the k-th argument (1-indexed).
///
/// Placeholders without a matching argument are left in place so the assembler can reject them.
pub fn substitute(line: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let digits = rest[at + 1..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let placeholder = &rest[at..at + 1 + digits];
        match placeholder[1..].parse::<usize>() {
            Ok(k) if (1..=args.len()).contains(&k) => out.push_str(&args[k - 1]),
            _ => out.push_str(placeholder),
        }
        rest = &rest[at + 1 + digits..];
    }
    out.push_str(rest);
    out
}

/// Decodes the body of a quoted char or string constant, quotes included, into bytes.
pub fn unquote(quoted: &str) -> Vec<u8> {
    let inner = quoted
        .get(1..quoted.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let byte = match chars.next() {
            Some('b') => 8,
            Some('f') => 12,
            Some('n') => 10,
            Some('r') => 13,
            Some('t') => 9,
            Some('v') => 11,
            Some('x' | 'X') => {
                let hex: String = chars.by_ref().take(2).collect();
                u8::from_str_radix(&hex, 16).unwrap_or_default()
            }
            Some(other) => other as u8,
            None => b'\\',
        };
        out.push(byte);
    }
    out
}

/// Number of bytes a quoted constant occupies, each escape counting as one.
pub fn byte_string_length(quoted: &str) -> usize {
    unquote(quoted).len()
}

/// Value of a constant of at most two bytes, big-endian.
pub fn string_value(quoted: &str) -> u16 {
    unquote(quoted)
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_shl(8) | *b as u16)
}

/// Token stream over every line of one module.
///
/// Lines are pulled lazily; matched tokens queue up until taken with
/// [`TokenBuffer::take_last_match`], oldest first.
#[derive(Debug)]
pub struct TokenBuffer {
    lines: VecDeque<String>,
    backlog: VecDeque<Token>,
    matches: VecDeque<Token>,
    lines_read: usize,
}

impl TokenBuffer {
    pub fn new(lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
            backlog: VecDeque::new(),
            matches: VecDeque::new(),
            lines_read: 0,
        }
    }

    fn fill(&mut self) -> bool {
        while self.backlog.is_empty() {
            let Some(line) = self.lines.pop_front() else {
                return false;
            };
            self.lines_read += 1;
            self.backlog.extend(tokenize_line(&line));
        }
        true
    }

    pub fn input_remains(&mut self) -> bool {
        self.fill()
    }
    pub fn peek(&mut self) -> Option<&Token> {
        self.fill();
        self.backlog.front()
    }
    pub fn lookahead(&mut self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }
    pub fn match_kind(&mut self, kind: TokenKind) -> bool {
        if !self.lookahead(kind) {
            return false;
        }
        if let Some(token) = self.backlog.pop_front() {
            self.matches.push_back(token);
        }
        true
    }
    pub fn match_one_of(&mut self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|kind| self.match_kind(*kind))
    }
    pub fn take_last_match(&mut self) -> Option<Token> {
        self.matches.pop_front()
    }
    /// Lines pulled from the source so far.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}
