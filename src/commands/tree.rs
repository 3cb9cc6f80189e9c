use crate::error::Result;
use crate::utils;
use clap::{Arg, Command, value_parser};
use colored::control::set_override;
use pager::Pager;
use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

pub fn get_tree_command() -> Command {
    Command::new("tree")
        .visible_alias("t")
        .about("Print the directory hierarchy of an image")
        .arg(
            Arg::new("image")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Initramfs image (gzip-compressed or raw cpio)"),
        )
        .arg(
            Arg::new("depth")
                .required(false)
                .value_parser(value_parser!(usize))
                .help("Maximum depth to descend"),
        )
}

pub fn tree(image: &Path, depth: Option<usize>) -> Result<()> {
    let tree = utils::load_tree(image)?;

    if io::stdout().is_terminal() {
        set_override(true);
        Pager::with_pager("less -R -F -X").setup();
    }

    print!("{}", utils::render_tree(&tree, depth.unwrap_or(usize::MAX)));
    Ok(())
}
