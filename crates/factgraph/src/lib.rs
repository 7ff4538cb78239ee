//! In-memory fact engine: a reference implementation of
//! [`taxflow_core::FactGraph`] with staged writes, derived facts,
//! placeholders and wrapper-tagged JSON persistence.

pub mod demo;
pub mod memory;

pub use memory::MemoryFactGraph;
