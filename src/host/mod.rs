//! Host-page collaborator boundary.
//!
//! The engine never talks to a concrete document model; it goes through
//! [`HostPage`], reached via a [`WindowAccessor`] that hands out `None`
//! during a windowless render pass instead of crashing. [`MemoryPage`]
//! is the reference implementation backing tests and headless hosts.

mod core;
mod memory;

pub use core::{HostPage, Mount, SharedPage, WindowAccessor, same_route};
pub use memory::{MemoryPage, NodeSnapshot};
