pub mod cursor;
pub mod reader;
pub mod types;
#[cfg(test)]
pub(crate) mod writer;

pub use cursor::{ByteCursor, DEFAULT_MAX_READ};
pub use reader::{BoxFuture, StreamReader};
pub use types::*;
