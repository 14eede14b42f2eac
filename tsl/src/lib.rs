pub mod block;
pub mod data;
pub mod error;
pub mod file;
pub mod label;
pub mod location;
pub mod section;
pub mod settings;
pub mod situation;
pub mod value;

pub use error::{Error, ErrorKind};
pub use location::SourceLocation;
