pub mod annotate;
pub mod assemble;
pub mod config;
pub mod digraph;
pub mod driver;
pub mod error;
pub mod graph;
pub mod ir;
pub mod isa;
pub mod lex;
pub mod link;
pub mod listing;
pub mod preprocess;
pub mod registry;
pub mod symbol;
pub mod trace;

pub use config::AsmConfig;
pub use driver::{AsmFailure, Driver, MemoryVector, ProgramOutput};
pub use registry::MacroRegistry;
