pub mod cat;
pub mod create;
pub mod list;
pub mod modify;
pub mod tree;

pub use cat::*;
pub use create::*;
pub use list::*;
pub use modify::*;
pub use tree::*;

use crate::utils::{DEFAULT_GZIP_LEVEL, ImageOptions};
use clap::{Arg, ArgAction, ArgMatches, value_parser};

/// Output flags shared by the commands that write images.
pub fn image_args() -> [Arg; 2] {
    [
        Arg::new("raw")
            .long("raw")
            .action(ArgAction::SetTrue)
            .help("Write a bare cpio stream without gzip"),
        Arg::new("level")
            .long("level")
            .value_parser(value_parser!(u32).range(0..=9))
            .env("IRFS_GZIP_LEVEL")
            .default_value("9")
            .help("gzip compression level"),
    ]
}

pub fn image_options(matches: &ArgMatches) -> ImageOptions {
    if matches.get_flag("raw") {
        return ImageOptions { compression: None };
    }
    ImageOptions {
        compression: Some(
            matches
                .get_one::<u32>("level")
                .copied()
                .unwrap_or(DEFAULT_GZIP_LEVEL),
        ),
    }
}
