//! Trace tags and the commands a debugger replays to follow the stack and heap.


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAction {
    Push,
    Pop,
    SetFrame,
    SwapTrace,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    Next,
    Current,
    Previous,
    Deduced,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTarget {
    Globals,
    Stack,
    Heap,
    Swap,
    None,
}

/// Display format of a primitive, its width in bytes is the leading digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    F1C,
    F1D,
    F2D,
    F1H,
    F2H,
}

impl SymbolFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        use SymbolFormat::*;
        Some(match name.to_ascii_lowercase().as_str() {
            "1c" => F1C,
            "1d" => F1D,
            "2d" => F2D,
            "1h" => F1H,
            "2h" => F2H,
            _ => return None,
        })
    }
    pub fn size(self) -> u16 {
        use SymbolFormat::*;
        match self {
            F1C | F1D | F1H => 1,
            F2D | F2H => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceType {
    Primitive {
        name: String,
        format: SymbolFormat,
    },
    Array {
        name: String,
        format: SymbolFormat,
        len: u16,
    },
    Struct {
        name: String,
        fields: Vec<TraceType>,
    },
}

impl TraceType {
    pub fn name(&self) -> &str {
        match self {
            TraceType::Primitive { name, .. }
            | TraceType::Array { name, .. }
            | TraceType::Struct { name, .. } => name,
        }
    }
    pub fn size(&self) -> u16 {
        match self {
            TraceType::Primitive { format, .. } => format.size(),
            TraceType::Array { format, len, .. } => format.size().saturating_mul(*len),
            TraceType::Struct { fields, .. } => fields.iter().map(TraceType::size).sum(),
        }
    }
    pub fn renamed(mut self, to: &str) -> Self {
        match &mut self {
            TraceType::Primitive { name, .. }
            | TraceType::Array { name, .. }
            | TraceType::Struct { name, .. } => *name = to.to_owned(),
        }
        self
    }

    /// The two byte return address pushed by `CALL`.
    pub fn return_address() -> Self {
        TraceType::Primitive {
            name: "retAddr".to_owned(),
            format: SymbolFormat::F2H,
        }
    }
    /// The block pushed by a trap.
    pub fn process_control_block() -> Self {
        use SymbolFormat::*;
        let field = |name: &str, format| TraceType::Primitive {
            name: name.to_owned(),
            format,
        };
        TraceType::Struct {
            name: "pcb".to_owned(),
            fields: vec![
                field("NZVC", F1H),
                field("A", F2H),
                field("X", F2H),
                field("PC", F2H),
                field("SP", F2H),
                field("IS", F1H),
                field("OS", F2H),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceCommand {
    pub action: TraceAction,
    pub frame: FrameTarget,
    pub target: TraceTarget,
    pub ty: Option<TraceType>,
}

impl TraceCommand {
    pub fn push(frame: FrameTarget, target: TraceTarget, ty: TraceType) -> Self {
        Self {
            action: TraceAction::Push,
            frame,
            target,
            ty: Some(ty),
        }
    }
    pub fn pop(frame: FrameTarget, target: TraceTarget, ty: TraceType) -> Self {
        Self {
            action: TraceAction::Pop,
            frame,
            target,
            ty: Some(ty),
        }
    }
    pub fn set_frame(frame: FrameTarget) -> Self {
        Self {
            action: TraceAction::SetFrame,
            frame,
            target: TraceTarget::Stack,
            ty: None,
        }
    }
    pub fn swap() -> Self {
        Self {
            action: TraceAction::SwapTrace,
            frame: FrameTarget::None,
            target: TraceTarget::Swap,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Primitive(SymbolFormat),
    Array(SymbolFormat, u16),
    Symbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHint {
    Params,
    Locals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentTags {
    pub tags: Vec<Tag>,
    pub hint: Option<FrameHint>,
    /// Tags that start with `#` but fit no grammar.
    pub malformed: Vec<String>,
}

impl CommentTags {
    /// Malformed words alone do not make a comment tagged.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Pulls `#tag` and `@params`/`@locals` words out of a comment.
pub fn parse_tags(comment: &str) -> CommentTags {
    let mut out = CommentTags::default();
    for word in comment.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        if let Some(hint) = word.strip_prefix('@') {
            match hint.to_ascii_lowercase().as_str() {
                "params" => out.hint = Some(FrameHint::Params),
                "locals" => out.hint = Some(FrameHint::Locals),
                _ => {}
            }
            continue;
        }
        let Some(tag) = word.strip_prefix('#') else {
            continue;
        };
        match parse_tag(tag) {
            Some(tag) => out.tags.push(tag),
            None => out.malformed.push(word.to_owned()),
        }
    }
    out
}

fn parse_tag(tag: &str) -> Option<Tag> {
    let first = tag.chars().next()?;
    if first.is_ascii_alphabetic() || first == '_' {
        return tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
            .then(|| Tag::Symbol(tag.to_owned()));
    }
    let format = SymbolFormat::from_name(tag.get(..2)?)?;
    let rest = &tag[2..];
    if rest.is_empty() {
        return Some(Tag::Primitive(format));
    }
    let len = rest.strip_suffix(['a', 'A'])?;
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Tag::Array(format, len.parse().ok()?))
}
