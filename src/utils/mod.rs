pub mod cpio_entry;
pub mod file_util;
pub mod navigator;
pub mod newc;
pub mod render;
pub mod tree;

pub use cpio_entry::*;
pub use file_util::*;
pub use navigator::*;
pub use newc::*;
pub use render::*;
pub use tree::*;
