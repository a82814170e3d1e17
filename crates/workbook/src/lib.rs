//! Workbook tree mapping
//!
//! Loads an XML workbook into a navigable node graph where attributes are
//! fields and children are published under meaningful names instead of
//! positions, then writes the (possibly edited) graph back out.
//!
//! ## Core Design
//!
//! ```text
//! bytes → XmlTree → TreeBuilder → NodeArena (Document) → XmlSerializer → bytes
//!                        ↓
//!              naming rules + promotion
//! ```
//!
//! - Nodes live in an arena and refer to each other by `NodeId` (u32)
//! - Each node keeps an explicit table of named children
//! - A node with a single child exposes that child's attributes
//! - Round trips keep tags, attributes and order; indentation-only text is
//!   dropped

pub mod arena;
pub mod builder;
pub mod calculations;
pub mod document;
pub mod error;
pub mod naming;
pub mod serializer;
pub mod shortcuts;
pub mod types;
pub mod utils;
pub mod xml;

pub use arena::NodeArena;
pub use builder::TreeBuilder;
pub use calculations::{extract_calculations, Calculations, SkipReason};
pub use document::{Document, LoadOptions, ShortcutMode};
pub use error::{Result, WorkbookError};
pub use naming::{normalize, NamingConfig, NamingRule, Resolution};
pub use serializer::{SerializerConfig, XmlSerializer};
pub use shortcuts::{build_shortcuts, ShortcutMap, ShortcutTable};
pub use types::*;
pub use xml::{XmlElement, XmlTree};

#[cfg(test)]
pub(crate) mod testing {
    pub const SAMPLE: &str = include_str!("../testdata/sample.twb");

    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }
}
