//! Resource sources for Vigil
//!
//! The live cloud transport is not part of this workspace. Resources come
//! either from memory ([`StaticSource`]) or from an exported inventory file
//! ([`InventorySource`]) that is classified into discriminators the same
//! way the discovery queries would.

pub mod category;
pub mod inventory;
pub mod memory;

pub use category::{classify, Category, CATEGORIES};
pub use inventory::{InventoryFormat, InventorySource};
pub use memory::StaticSource;
