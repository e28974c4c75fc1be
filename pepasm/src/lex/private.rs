use std::str::Chars;

/// Character cursor over one trimmed line.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    chars: Chars<'a>,
}

const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars(),
        }
    }
    pub(crate) fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }
    pub(crate) fn second(&self) -> char {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().unwrap_or(EOF_CHAR)
    }
    pub(crate) fn third(&self) -> char {
        self.chars.clone().nth(2).unwrap_or(EOF_CHAR)
    }
    pub(crate) fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }
    pub(crate) fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }
    /// Returns true if anything was consumed.
    pub(crate) fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> bool {
        let start = self.pos();
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
        self.pos() != start
    }
    /// Byte offset into the line.
    pub(crate) fn pos(&self) -> usize {
        self.src.len() - self.chars.as_str().len()
    }
    pub(crate) fn slice(&self, start: usize) -> &'a str {
        &self.src[start..self.pos()]
    }
    pub(crate) fn rest(&self) -> &'a str {
        self.chars.as_str()
    }
}
