use crate::error::Result;
use crate::utils;
use clap::{Arg, Command, value_parser};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

pub fn get_cat_command() -> Command {
    Command::new("cat")
        .about("Write the content of an archived file to stdout")
        .arg(
            Arg::new("image")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Initramfs image (gzip-compressed or raw cpio)"),
        )
        .arg(
            Arg::new("path")
                .required(true)
                .help("Archive path of the file"),
        )
        .arg_required_else_help(true)
}

pub fn cat(image: &Path, path: &str) -> Result<()> {
    let tree = utils::load_tree(image)?;
    let content = tree.read_content(path)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(content)?;
    stdout.flush()?;
    Ok(())
}
