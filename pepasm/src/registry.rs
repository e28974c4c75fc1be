use ahash::AHashMap;

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKind {
    Core,
    System,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCallKind {
    Unary,
    NonUnary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub arg_count: u8,
    pub kind: MacroKind,
    /// Full body, header line included.
    pub text: String,
}

impl Macro {
    /// The body without its `@NAME argcount` header.
    pub fn body(&self) -> &str {
        match self.text.split_once('\n') {
            Some((_, body)) => body,
            None => "",
        }
    }
}

/// Macros keyed by their upper-cased name.
#[derive(Debug, Default)]
pub struct MacroRegistry {
    macros: AHashMap<String, Macro>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_core_macro(&mut self, name: &str, text: &str) -> bool {
        self.register(name, text, MacroKind::Core)
    }
    pub fn register_custom_macro(&mut self, name: &str, text: &str) -> bool {
        self.register(name, text, MacroKind::User)
    }
    pub fn register_system_call(&mut self, kind: SystemCallKind, name: &str) -> bool {
        let text = match kind {
            SystemCallKind::NonUnary => {
                format!("@{name} 2\nLDWT {name}, i\nSCALL $1, $2\n.END\n")
            }
            SystemCallKind::Unary => format!("@{name} 0\nLDWT {name}, i\nUSCALL\n.END\n"),
        };
        self.register(name, &text, MacroKind::System)
    }

    fn register(&mut self, name: &str, text: &str, kind: MacroKind) -> bool {
        let key = name.to_ascii_uppercase();
        if self.macros.contains_key(&key) {
            tracing::debug!("macro {name} is already registered");
            return false;
        }
        let Some((header_name, arg_count)) = parse_header(text) else {
            tracing::debug!("macro {name} has a malformed header");
            return false;
        };
        if !header_name.eq_ignore_ascii_case(name) {
            tracing::debug!("macro {name} declares itself as {header_name}");
            return false;
        }
        self.macros.insert(
            key,
            Macro {
                name: name.to_owned(),
                arg_count,
                kind,
                text: text.to_owned(),
            },
        );
        true
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(&name.to_ascii_uppercase())
    }
    pub fn get_macro(&self, name: &str) -> Option<&Macro> {
        self.macros.get(&name.to_ascii_uppercase())
    }
    /// All macros of one kind, sorted by name.
    pub fn get_macros(&self, kind: MacroKind) -> Vec<&Macro> {
        let mut out: Vec<_> = self.macros.values().filter(|m| m.kind == kind).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
    pub fn clear_system_calls(&mut self) {
        self.macros.retain(|_, m| m.kind != MacroKind::System);
    }
}

/// Splits a `@NAME argcount` header line.
pub fn parse_header(text: &str) -> Option<(&str, u8)> {
    let header = text.lines().next()?.trim();
    let rest = header.strip_prefix('@')?;
    let mut parts = rest.split_whitespace();
    let (name, count) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let mut chars = name.chars();
    let valid_name = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name || !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((name, count.parse().ok()?))
}
