pub mod cli;
pub mod commands;
pub mod error;
pub mod utils;

pub use cli::cli;
pub use error::{Error, Result};
pub use utils::{CpioEntry, EntryKind, ImageOptions, Listing, Node, Tree, decode, encode};
