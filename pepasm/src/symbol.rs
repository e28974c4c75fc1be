use ahash::AHashMap;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    pub table: TableId,
    pub symbol: SymbolId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolValue {
    #[default]
    Empty,
    Numeric(u16),
    /// An address; the effective value is `base + offset` so a whole image can be relocated by
    /// changing the offset alone.
    Location {
        base: u16,
        offset: u16,
    },
    External(SymbolRef),
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: DefaultSymbol,
    pub value: SymbolValue,
    /// Declared somewhere in the owning module.
    pub defined: bool,
    pub multiply_defined: bool,
    pub exported: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    by_name: AHashMap<DefaultSymbol, SymbolId>,
}

impl SymbolTable {
    /// Returns the entry for `name`, creating an undefined one if needed.
    pub fn reference(&mut self, name: DefaultSymbol) -> SymbolId {
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = SymbolId(self.entries.len() as u32);
        self.entries.push(SymbolEntry {
            name,
            value: SymbolValue::Empty,
            defined: false,
            multiply_defined: false,
            exported: false,
        });
        self.by_name.insert(name, id);
        id
    }
    /// Declares `name`. A second declaration only raises the multiply defined flag.
    pub fn define(&mut self, name: DefaultSymbol) -> SymbolId {
        let id = self.reference(name);
        let entry = &mut self.entries[id.0 as usize];
        if entry.defined {
            entry.multiply_defined = true;
        }
        entry.defined = true;
        id
    }
    pub fn get(&self, name: DefaultSymbol) -> Option<SymbolId> {
        self.by_name.get(&name).copied()
    }
    pub fn entry(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id.0 as usize]
    }
    pub fn entry_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.entries[id.0 as usize]
    }
    pub fn set_value(&mut self, id: SymbolId, value: SymbolValue) {
        self.entry_mut(id).value = value;
    }
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (SymbolId(i as u32), e))
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every symbol table of one assembly run, sharing a single name interner.
#[derive(Debug, Default)]
pub struct Symbols {
    pub si: StringInterner<DefaultBackend>,
    tables: Vec<SymbolTable>,
}

impl Symbols {
    pub fn new_table(&mut self) -> TableId {
        self.tables.push(SymbolTable::default());
        TableId(self.tables.len() as u32 - 1)
    }
    pub fn clone_table(&mut self, table: TableId) -> TableId {
        let copy = self.table(table).clone();
        self.tables.push(copy);
        TableId(self.tables.len() as u32 - 1)
    }
    pub fn table(&self, table: TableId) -> &SymbolTable {
        &self.tables[table.0 as usize]
    }
    pub fn table_mut(&mut self, table: TableId) -> &mut SymbolTable {
        &mut self.tables[table.0 as usize]
    }
    pub fn intern(&mut self, name: &str) -> DefaultSymbol {
        self.si.get_or_intern(name)
    }
    pub fn lookup(&self, table: TableId, name: &str) -> Option<SymbolId> {
        self.table(table).get(self.si.get(name)?)
    }
    pub fn resolve(&self, name: DefaultSymbol) -> &str {
        self.si.resolve(name).unwrap_or_default()
    }
    pub fn name(&self, table: TableId, symbol: SymbolId) -> &str {
        self.resolve(self.table(table).entry(symbol).name)
    }
    /// The effective value of a symbol, following external references.
    ///
    /// `None` for a symbol without a value or a broken chain of references.
    pub fn value(&self, mut at: SymbolRef) -> Option<u16> {
        for _ in 0..=self.tables.len() {
            match self.table(at.table).entry(at.symbol).value {
                SymbolValue::Empty => return None,
                SymbolValue::Numeric(v) => return Some(v),
                SymbolValue::Location { base, offset } => return Some(base.wrapping_add(offset)),
                SymbolValue::External(next) => at = next,
            }
        }
        None
    }
}
