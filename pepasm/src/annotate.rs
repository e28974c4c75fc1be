use std::collections::BTreeMap;

use crate::{
    error::{Diagnostic, LineError, Stage},
    graph::{InstanceId, ModuleAssemblyGraph},
    ir::{Argument, LineKind},
    isa::Mnemonic,
    trace::{
        parse_tags, CommentTags, FrameHint, FrameTarget, Tag, TraceCommand, TraceTarget,
        TraceType,
    },
};

#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotateError {
    #[error("Malformed trace tag {0}.")]
    MalformedTag(String),
    #[error("Could not resolve trace tag #{0}.")]
    Unresolved(String),
    #[error("{0} must carry trace tags once the program uses them.")]
    MissingTags(&'static str),
    #[error("Trace tags total {tagged} bytes, but the instruction allocates {allocated}.")]
    SizeMismatch { tagged: u16, allocated: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationStatus {
    #[default]
    Success,
    SuccessWithWarnings,
    Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationResult {
    pub had_trace_tags: bool,
    pub status: AnnotationStatus,
    pub warnings: Vec<LineError>,
    pub errors: Vec<LineError>,
}

/// One line of the linked program in address order.
struct Site {
    instance: InstanceId,
    index: usize,
    root_line: usize,
    tags: CommentTags,
}

/// Translates trace tags into trace commands on each line of the linked program.
///
/// Object code and addresses are left untouched.
pub fn annotate(graph: &mut ModuleAssemblyGraph) -> AnnotationResult {
    let mut sites = Vec::new();
    collect(graph, graph.root_instance(), None, &mut sites);
    let mut result = AnnotationResult {
        had_trace_tags: sites.iter().any(|site| !site.tags.is_empty()),
        ..AnnotationResult::default()
    };
    if !result.had_trace_tags {
        return result;
    }
    let mut annotater = Annotater {
        graph,
        types: BTreeMap::new(),
        result: &mut result,
    };
    annotater.declare_types(&sites);
    for site in &sites {
        annotater.translate(site);
    }
    result.status = if !result.errors.is_empty() {
        AnnotationStatus::Failure
    } else if !result.warnings.is_empty() {
        AnnotationStatus::SuccessWithWarnings
    } else {
        AnnotationStatus::Success
    };
    tracing::debug!(
        "annotated program with {} warnings and {} errors",
        result.warnings.len(),
        result.errors.len()
    );
    result
}

fn collect(
    graph: &ModuleAssemblyGraph,
    id: InstanceId,
    root_line: Option<usize>,
    sites: &mut Vec<Site>,
) {
    for (index, line) in graph.instance(id).lines.iter().enumerate() {
        let root_line = root_line.unwrap_or(line.source_line);
        sites.push(Site {
            instance: id,
            index,
            root_line,
            tags: line.comment.as_deref().map(parse_tags).unwrap_or_default(),
        });
        if let LineKind::MacroInvoke { instance, .. } = &line.kind {
            collect(graph, *instance, Some(root_line), sites);
        }
    }
}

struct Annotater<'a> {
    graph: &'a mut ModuleAssemblyGraph,
    types: BTreeMap<String, TraceType>,
    result: &'a mut AnnotationResult,
}

impl Annotater<'_> {
    fn warn(&mut self, line: usize, error: AnnotateError) {
        self.result.warnings.push(LineError::new(
            line,
            Diagnostic::warning(Stage::BackEnd, error),
        ));
    }
    fn error(&mut self, line: usize, error: AnnotateError) {
        self.result
            .errors
            .push(LineError::new(line, Diagnostic::error(Stage::BackEnd, error)));
    }

    fn symbol_name(&self, site: &Site) -> String {
        let instance = self.graph.instance(site.instance);
        match instance.lines[site.index].symbol {
            Some(symbol) => self.graph.symbols.name(instance.table, symbol).to_owned(),
            None => String::new(),
        }
    }

    /// Resolves the types declared on `.EQUATE` lines, repeating until nothing changes.
    fn declare_types(&mut self, sites: &[Site]) {
        let mut pending: Vec<(usize, String, Vec<Tag>)> = sites
            .iter()
            .filter(|site| {
                matches!(
                    self.graph.instance(site.instance).lines[site.index].kind,
                    LineKind::Equate(_)
                ) && !site.tags.tags.is_empty()
            })
            .map(|site| (site.root_line, self.symbol_name(site), site.tags.tags.clone()))
            .collect();
        loop {
            let before = pending.len();
            pending.retain(|(_, name, tags)| {
                let Some(fields) = tags
                    .iter()
                    .map(|tag| resolve_tag(&self.types, tag, ""))
                    .collect::<Option<Vec<_>>>()
                else {
                    return true;
                };
                let ty = match (tags.as_slice(), fields.as_slice()) {
                    ([Tag::Primitive(_) | Tag::Array(..)], [field]) => field.clone().renamed(name),
                    _ => TraceType::Struct {
                        name: name.clone(),
                        fields,
                    },
                };
                self.types.insert(name.clone(), ty);
                false
            });
            if pending.len() == before {
                break;
            }
        }
        for (line, _, tags) in pending {
            for tag in tags {
                if let Tag::Symbol(name) = tag {
                    if !self.types.contains_key(&name) {
                        self.warn(line, AnnotateError::Unresolved(name));
                    }
                }
            }
        }
    }

    /// Types named by the tags of one line. Unresolved tags are reported and left out.
    fn tag_types(&mut self, site: &Site, name: &str) -> (Vec<TraceType>, bool) {
        let mut out = Vec::new();
        let mut complete = true;
        for malformed in &site.tags.malformed {
            self.warn(site.root_line, AnnotateError::MalformedTag(malformed.clone()));
        }
        for tag in &site.tags.tags {
            match resolve_tag(&self.types, tag, name) {
                Some(ty) => out.push(ty),
                None => {
                    complete = false;
                    if let Tag::Symbol(missing) = tag {
                        self.warn(site.root_line, AnnotateError::Unresolved(missing.clone()));
                    }
                }
            }
        }
        (out, complete && site.tags.malformed.is_empty())
    }

    fn translate(&mut self, site: &Site) {
        use LineKind::*;
        let instance = self.graph.instance(site.instance);
        let table = instance.table;
        let line = &instance.lines[site.index];
        let kind = line.kind.clone();
        let name = self.symbol_name(site);
        let mut commands = Vec::new();
        match kind {
            Block(_) | Byte(_) | Word(_) if !site.tags.is_empty() => {
                let (types, _) = self.tag_types(site, &name);
                commands.extend(
                    types
                        .into_iter()
                        .map(|ty| TraceCommand::push(FrameTarget::None, TraceTarget::Globals, ty)),
                );
            }
            Unary { mnemonic, .. } => match mnemonic {
                Mnemonic::Ret => {
                    commands.push(TraceCommand::pop(
                        FrameTarget::Current,
                        TraceTarget::Stack,
                        TraceType::return_address(),
                    ));
                    commands.push(TraceCommand::set_frame(FrameTarget::Previous));
                }
                Mnemonic::Sret => {
                    commands.push(TraceCommand::pop(
                        FrameTarget::Current,
                        TraceTarget::Stack,
                        TraceType::process_control_block(),
                    ));
                    commands.push(TraceCommand::swap());
                }
                Mnemonic::Movasp => commands.push(TraceCommand::swap()),
                Mnemonic::Uscall => commands.extend(trap()),
                _ => {}
            },
            NonUnary { mnemonic, arg, .. } => match mnemonic {
                Mnemonic::Scall => commands.extend(trap()),
                Mnemonic::Call => {
                    commands.push(TraceCommand::push(
                        FrameTarget::Next,
                        TraceTarget::Stack,
                        TraceType::return_address(),
                    ));
                    commands.push(TraceCommand::set_frame(FrameTarget::Next));
                    let target = match &arg {
                        Argument::Symbol(symbol) => self.graph.symbols.name(table, *symbol),
                        _ => "",
                    };
                    if target == "malloc" {
                        let (types, _) = self.tag_types(site, &name);
                        commands.extend(types.into_iter().map(|ty| {
                            TraceCommand::push(FrameTarget::None, TraceTarget::Heap, ty)
                        }));
                    }
                }
                Mnemonic::Subsp | Mnemonic::Addsp => {
                    let allocated = arg.value(table, &self.graph.symbols);
                    let spelled = if mnemonic == Mnemonic::Subsp {
                        "SUBSP"
                    } else {
                        "ADDSP"
                    };
                    if site.tags.is_empty() {
                        self.error(site.root_line, AnnotateError::MissingTags(spelled));
                    } else {
                        let (types, complete) = self.tag_types(site, &name);
                        let tagged: u16 = types.iter().map(TraceType::size).sum();
                        if complete && tagged != allocated {
                            self.error(
                                site.root_line,
                                AnnotateError::SizeMismatch { tagged, allocated },
                            );
                        }
                        let frame = match (mnemonic, site.tags.hint) {
                            (Mnemonic::Subsp, Some(FrameHint::Params)) => FrameTarget::Next,
                            (Mnemonic::Subsp, Some(FrameHint::Locals)) => FrameTarget::Current,
                            _ => FrameTarget::Deduced,
                        };
                        commands.extend(types.into_iter().map(|ty| {
                            if mnemonic == Mnemonic::Subsp {
                                TraceCommand::push(frame, TraceTarget::Stack, ty)
                            } else {
                                TraceCommand::pop(frame, TraceTarget::Stack, ty)
                            }
                        }));
                    }
                }
                _ => {}
            },
            _ => {}
        }
        self.graph.instance_mut(site.instance).lines[site.index].trace = commands;
    }
}

/// A trap pushes the process control block, swaps to the system trace and opens a frame.
fn trap() -> [TraceCommand; 3] {
    [
        TraceCommand::push(
            FrameTarget::Current,
            TraceTarget::Stack,
            TraceType::process_control_block(),
        ),
        TraceCommand::swap(),
        TraceCommand::set_frame(FrameTarget::Next),
    ]
}

fn resolve_tag(types: &BTreeMap<String, TraceType>, tag: &Tag, name: &str) -> Option<TraceType> {
    Some(match tag {
        Tag::Primitive(format) => TraceType::Primitive {
            name: name.to_owned(),
            format: *format,
        },
        Tag::Array(format, len) => TraceType::Array {
            name: name.to_owned(),
            format: *format,
            len: *len,
        },
        Tag::Symbol(symbol) => types.get(symbol)?.clone(),
    })
}
