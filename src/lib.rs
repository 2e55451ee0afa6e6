#![doc = include_str!("../README.md")]

pub mod error;
pub mod host;
pub mod ops;
pub mod path;
pub mod transaction;

mod tree;

pub use error::*;
pub use path::StandardizedPath;
pub use transaction::TransactionalFileSystem;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
