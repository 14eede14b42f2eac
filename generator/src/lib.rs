//! Test program generation from composition templates.
//!
//! A template describes blocks of instruction calls, how they combine, and
//! the data they use. `generate` runs its pre, main and post phases on a
//! fresh `Context` and returns the expanded sequences with labels resolved.

pub mod context;
pub mod data;
pub mod expand;
pub mod file_template;
pub mod output;
pub mod page_table;
pub mod random;
pub mod resolve;
pub mod situations;
pub mod strategy;
pub mod stream;
pub mod template;

pub use context::{AttributeScope, BlockConfig, BlockHandle, Context};
pub use data::{DataRegion, DataScope, Origin};
pub use file_template::FileTemplate;
pub use page_table::{MemoryObject, PageTable, PageTableEntry};
pub use resolve::{Instruction, LabelTarget, Operand};
pub use situations::Names;
pub use template::{GeneratedTemplate, Lifecycle, Phase, PhaseKind, Template, generate, generate_with};
