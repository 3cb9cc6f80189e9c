use crate::error::Result;
use crate::utils::{self, Listing};
use clap::{Arg, Command, value_parser};
use std::path::{Path, PathBuf};

pub fn get_list_command() -> Command {
    Command::new("list")
        .visible_aliases(["ls", "l"])
        .about("Show entries of an image")
        .long_about(
            "Show an entry of an image. A path ending in '/' lists the \
             directory contents instead of the directory itself.",
        )
        .arg(
            Arg::new("image")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Initramfs image (gzip-compressed or raw cpio)"),
        )
        .arg(
            Arg::new("path")
                .required(false)
                .default_value("./")
                .help("Archive path, e.g. 'etc/' or 'init'"),
        )
}

pub fn list(image: &Path, path: &str) -> Result<()> {
    let tree = utils::load_tree(image)?;

    let output = match tree.ls(path)? {
        Listing::Entry(entry) => utils::render_entries(&[entry]),
        Listing::Children(children) => utils::render_entries(&children),
    };
    print!("{output}");
    Ok(())
}
