use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::{
    digraph::{shortest_path, DiGraph},
    error::ErrorDictionary,
    ir::{Line, LineKind},
    lex::substitute,
    symbol::{Symbols, TableId},
};


pub const ROOT_NAME: &str = "@@main@@";
pub const ROOT: PrototypeId = 0;

pub type PrototypeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Macro,
    OperatingSystem,
    UserProgram,
}

#[derive(Debug, Clone)]
pub struct ModulePrototype {
    pub index: PrototypeId,
    pub name: String,
    pub kind: ModuleType,
    /// Source lines; a macro's header line is not included.
    pub lines: Vec<String>,
    pub line_to_instance: BTreeMap<usize, InstanceId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurnInfo {
    pub count: u16,
    pub argument: u16,
    pub address: u16,
    pub start_rom: u16,
}

#[derive(Debug, Clone)]
pub struct ModuleInstance {
    pub id: InstanceId,
    pub prototype: PrototypeId,
    pub args: Vec<String>,
    pub lines: Vec<Line>,
    pub table: TableId,
    pub burn: BurnInfo,
    pub assembled: bool,
    pub linked: bool,
}

/// Every module taking part in one assembly run.
#[derive(Debug)]
pub struct ModuleAssemblyGraph {
    pub graph: DiGraph,
    pub prototypes: Vec<ModulePrototype>,
    instances: Vec<ModuleInstance>,
    pub instance_map: BTreeMap<PrototypeId, Vec<InstanceId>>,
    pub symbols: Symbols,
    pub errors: ErrorDictionary,
}

impl ModuleAssemblyGraph {
    pub fn new(text: &str, kind: ModuleType) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            prototypes: Vec::new(),
            instances: Vec::new(),
            instance_map: BTreeMap::new(),
            symbols: Symbols::default(),
            errors: ErrorDictionary::default(),
        };
        let root = graph.add_prototype(ROOT_NAME, kind, text);
        graph.add_instance(root, Vec::new());
        graph
    }

    pub fn root_instance(&self) -> InstanceId {
        InstanceId(0)
    }
    pub fn root_kind(&self) -> ModuleType {
        self.prototypes[ROOT].kind
    }
    pub fn is_os(&self) -> bool {
        self.root_kind() == ModuleType::OperatingSystem
    }
    pub fn root_table(&self) -> TableId {
        self.instance(self.root_instance()).table
    }

    pub fn prototype(&self, index: PrototypeId) -> &ModulePrototype {
        &self.prototypes[index]
    }
    pub fn prototype_mut(&mut self, index: PrototypeId) -> &mut ModulePrototype {
        &mut self.prototypes[index]
    }
    pub fn prototype_index(&self, name: &str) -> Option<PrototypeId> {
        self.prototypes
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }
    pub fn add_prototype(&mut self, name: &str, kind: ModuleType, text: &str) -> PrototypeId {
        let index = self.prototypes.len();
        self.prototypes.push(ModulePrototype {
            index,
            name: name.to_owned(),
            kind,
            lines: text.lines().map(str::to_owned).collect(),
            line_to_instance: BTreeMap::new(),
        });
        self.graph.add_vertex(index);
        index
    }
    /// The prototype named `name`, created from `body` when it does not exist yet.
    pub fn maybe_create_prototype(&mut self, name: &str, body: &str) -> PrototypeId {
        match self.prototype_index(name) {
            Some(index) => index,
            None => self.add_prototype(name, ModuleType::Macro, body),
        }
    }

    pub fn instance(&self, id: InstanceId) -> &ModuleInstance {
        &self.instances[id.0 as usize]
    }
    pub fn instance_mut(&mut self, id: InstanceId) -> &mut ModuleInstance {
        &mut self.instances[id.0 as usize]
    }
    pub fn find_instance(&self, prototype: PrototypeId, args: &[String]) -> Option<InstanceId> {
        self.instance_map
            .get(&prototype)?
            .iter()
            .copied()
            .find(|id| {
                let other = &self.instance(*id).args;
                other.len() == args.len()
                    && other
                        .iter()
                        .zip(args)
                        .all(|(a, b)| a.eq_ignore_ascii_case(b))
            })
    }
    pub fn add_instance(&mut self, prototype: PrototypeId, args: Vec<String>) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        let table = self.symbols.new_table();
        self.instances.push(ModuleInstance {
            id,
            prototype,
            args,
            lines: Vec::new(),
            table,
            burn: BurnInfo::default(),
            assembled: false,
            linked: false,
        });
        self.instance_map.entry(prototype).or_default().push(id);
        id
    }
    pub fn maybe_create_instance(&mut self, prototype: PrototypeId, args: Vec<String>) -> InstanceId {
        match self.find_instance(prototype, &args) {
            Some(id) => id,
            None => self.add_instance(prototype, args),
        }
    }
    /// Copies an assembled instance under a fresh handle with its own symbol table.
    pub fn clone_instance(&mut self, id: InstanceId) -> InstanceId {
        let mut copy = self.instance(id).clone();
        copy.id = InstanceId(self.instances.len() as u32);
        copy.table = self.symbols.clone_table(copy.table);
        self.instance_map
            .entry(copy.prototype)
            .or_default()
            .push(copy.id);
        let clone = copy.id;
        self.instances.push(copy);
        clone
    }

    /// Source of an instance with its arguments substituted.
    pub fn instance_source(&self, id: InstanceId) -> Vec<String> {
        let instance = self.instance(id);
        self.prototype(instance.prototype)
            .lines
            .iter()
            .map(|line| substitute(line, &instance.args))
            .collect()
    }

    /// The root line responsible for anything that goes wrong inside `prototype`.
    ///
    /// That is the first root line including the first hop on the shortest path from the root.
    pub fn root_line_for(&self, prototype: PrototypeId) -> Option<usize> {
        let path = shortest_path(&self.graph, ROOT, prototype)?;
        let first = *path.first()?;
        self.root_line_including(first)
    }
    pub fn root_line_including(&self, prototype: PrototypeId) -> Option<usize> {
        self.prototype(ROOT)
            .line_to_instance
            .iter()
            .find(|(_, id)| self.instance(**id).prototype == prototype)
            .map(|(line, _)| *line)
    }
    /// First root line whose invocation expands, directly or not, into `target`.
    pub fn root_line_reaching(&self, target: InstanceId) -> Option<usize> {
        self.prototype(ROOT)
            .line_to_instance
            .iter()
            .find(|(_, id)| self.reaches(**id, target))
            .map(|(line, _)| *line)
    }
    fn reaches(&self, from: InstanceId, target: InstanceId) -> bool {
        let mut seen = BTreeSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            if id == target {
                return true;
            }
            let instance = self.instance(id);
            let invoked = instance.lines.iter().filter_map(|line| match &line.kind {
                LineKind::MacroInvoke { instance, .. } => Some(*instance),
                _ => None,
            });
            let included = self.prototype(instance.prototype).line_to_instance.values();
            for child in invoked.chain(included.copied()) {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        false
    }
    /// Maps a line of `instance` onto the root.
    pub fn attribute(&self, instance: InstanceId, line: usize) -> usize {
        let prototype = self.instance(instance).prototype;
        if prototype == ROOT {
            return line;
        }
        self.root_line_reaching(instance)
            .or_else(|| self.root_line_for(prototype))
            .unwrap_or(0)
    }

    /// Bytes of object code an instance occupies, macro bodies included.
    pub fn instance_length(&self, id: InstanceId) -> u32 {
        let instance = self.instance(id);
        instance
            .lines
            .iter()
            .map(|line| match &line.kind {
                LineKind::MacroInvoke { instance, .. } => self.instance_length(*instance),
                _ => line.own_length(self.instance(id).table, &self.symbols) as u32,
            })
            .sum()
    }
    pub fn object_code(&self, id: InstanceId, out: &mut Vec<u8>) {
        let instance = self.instance(id);
        for line in &instance.lines {
            match &line.kind {
                LineKind::MacroInvoke { instance, .. } => self.object_code(*instance, out),
                _ => line.object_code(instance.table, &self.symbols, out),
            }
        }
    }
    /// `id` and every instance it invokes, breadth first.
    pub fn reachable(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            for line in &self.instance(out[i]).lines {
                if let LineKind::MacroInvoke { instance, .. } = &line.kind {
                    out.push(*instance);
                }
            }
            i += 1;
        }
        out
    }
}
