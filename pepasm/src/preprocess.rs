use crate::{
    digraph::prune_leaves,
    error::{Diagnostic, LineError, Stage},
    graph::{ModuleAssemblyGraph, PrototypeId, ROOT},
    registry::MacroRegistry,
};


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreprocessError {
    #[error("Only one macro may be referenced per line.")]
    TooManyMacros,
    #[error("A @ must be followed by a string identifier.")]
    NoIdentifier,
    #[error("Referenced macro does not exist.")]
    NoSuchMacro,
    #[error("Macro supplied wrong number of arguments.")]
    BadArgCount,
    #[error("Cannot use $ as part of a macro identifier.")]
    DollarInMacro,
    #[error("Bad argument: {0}. Cannot use $ in macro argument.")]
    InvalidArg(String),
    #[error("Circular macro inclusion detected.")]
    CircularInclude,
    #[error("Macro definition invokes itself.")]
    SelfReference,
}

/// A macro reference found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: &'a str,
    pub args: Vec<String>,
}

/// Builds the module graph below the root and checks that it is acyclic.
pub fn preprocess(
    graph: &mut ModuleAssemblyGraph,
    registry: &MacroRegistry,
) -> Result<(), Vec<LineError>> {
    let mut index = 0;
    while index < graph.prototypes.len() {
        if let Err((line, error)) = scan_prototype(graph, registry, index) {
            tracing::debug!("preprocessing {} failed on line {line}", graph.prototype(index).name);
            return Err(vec![report(graph, index, line, error)]);
        }
        index += 1;
    }
    let survivors = prune_leaves(&graph.graph);
    if !survivors.is_empty() {
        let line = graph
            .prototype(ROOT)
            .line_to_instance
            .iter()
            .find(|(_, id)| survivors.contains(graph.instance(**id).prototype))
            .map(|(line, _)| *line)
            .unwrap_or_default();
        return Err(vec![report(graph, ROOT, line, PreprocessError::CircularInclude)]);
    }
    tracing::debug!("preprocessed {} modules", graph.prototypes.len());
    Ok(())
}

fn report(
    graph: &mut ModuleAssemblyGraph,
    prototype: PrototypeId,
    line: usize,
    error: PreprocessError,
) -> LineError {
    let diagnostic = Diagnostic::error(Stage::FrontEnd, error);
    let root_line = if prototype == ROOT {
        line
    } else {
        graph.root_line_for(prototype).unwrap_or_default()
    };
    if let Some(id) = graph
        .instance_map
        .get(&prototype)
        .and_then(|ids| ids.first())
        .copied()
    {
        graph.errors.add(id, line, diagnostic.clone());
    }
    LineError::new(root_line, diagnostic)
}

fn scan_prototype(
    graph: &mut ModuleAssemblyGraph,
    registry: &MacroRegistry,
    index: PrototypeId,
) -> Result<(), (usize, PreprocessError)> {
    let lines = graph.prototype(index).lines.clone();
    let own_name = graph.prototype(index).name.clone();
    for (i, line) in lines.iter().enumerate() {
        let Some(invocation) = extract_invocation(line).map_err(|e| (i, e))? else {
            continue;
        };
        let Some(found) = registry.get_macro(invocation.name) else {
            return Err((i, PreprocessError::NoSuchMacro));
        };
        if found.arg_count as usize != invocation.args.len() {
            return Err((i, PreprocessError::BadArgCount));
        }
        if found.name.eq_ignore_ascii_case(&own_name) {
            return Err((i, PreprocessError::SelfReference));
        }
        if let Some(bad) = invocation.args.iter().find_map(|arg| placeholder(arg)) {
            return Err((i, PreprocessError::InvalidArg(bad.to_owned())));
        }
        let child = graph.maybe_create_prototype(&found.name, found.body());
        graph.graph.add_edge(index, child);
        let instance = graph.maybe_create_instance(child, invocation.args);
        graph
            .prototype_mut(index)
            .line_to_instance
            .insert(i, instance);
    }
    Ok(())
}

/// Finds the macro reference on a line, if any.
///
/// `@` and `;` inside quoted constants do not count.
pub fn extract_invocation(line: &str) -> Result<Option<Invocation<'_>>, PreprocessError> {
    let code = &line[..comment_start(line).unwrap_or(line.len())];
    let ats: Vec<usize> = unquoted(code).filter(|(_, c)| *c == '@').map(|(i, _)| i).collect();
    let Some(&at) = ats.first() else {
        return Ok(None);
    };
    if ats.len() > 1 {
        return Err(PreprocessError::TooManyMacros);
    }
    let rest = &code[at + 1..];
    let name_len = rest
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(rest.len());
    let name = &rest[..name_len];
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
        return Err(PreprocessError::NoIdentifier);
    }
    if name.contains('$') {
        return Err(PreprocessError::DollarInMacro);
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PreprocessError::NoIdentifier);
    }
    let args = rest[name_len..].trim();
    let args = if args.is_empty() {
        Vec::new()
    } else {
        split_args(args)
    };
    Ok(Some(Invocation { name, args }))
}

/// Byte offset of the `;` that starts the comment.
fn comment_start(line: &str) -> Option<usize> {
    unquoted(line).find(|(_, c)| *c == ';').map(|(i, _)| i)
}

fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, _) in unquoted(args).filter(|(_, c)| *c == ',') {
        out.push(args[start..i].trim().to_owned());
        start = i + 1;
    }
    out.push(args[start..].trim().to_owned());
    out
}

/// Characters outside char and string constants, with their byte offsets.
fn unquoted(text: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote = None;
    let mut escaped = false;
    text.char_indices().filter(move |(_, c)| match quote {
        Some(q) => {
            if escaped {
                escaped = false;
            } else if *c == '\\' {
                escaped = true;
            } else if *c == q {
                quote = None;
            }
            false
        }
        None => {
            if matches!(*c, '\'' | '"') {
                quote = Some(*c);
                return false;
            }
            true
        }
    })
}

/// The first `$digits` inside an argument.
fn placeholder(arg: &str) -> Option<&str> {
    let at = arg
        .match_indices('$')
        .map(|(i, _)| i)
        .find(|i| arg[i + 1..].starts_with(|c: char| c.is_ascii_digit()))?;
    let digits = arg[at + 1..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    Some(&arg[at..at + 1 + digits])
}
