use crate::error::Result;
use crate::utils::{self, ImageOptions, Tree};
use clap::{Arg, Command, value_parser};
use std::path::{Path, PathBuf};

pub fn get_create_command() -> Command {
    Command::new("create")
        .visible_alias("c")
        .about("Pack a local directory into an image")
        .arg(
            Arg::new("dir")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory that becomes the archive root"),
        )
        .arg(
            Arg::new("image")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Output image"),
        )
        .args(super::image_args())
        .arg_required_else_help(true)
}

pub fn create(dir: &Path, image: &Path, options: &ImageOptions) -> Result<()> {
    let entries = utils::collect_local_entries(dir)?;
    let tree = Tree::build(entries)?;
    utils::save_tree(&tree, image, options)?;

    println!("Created {} with {} entries", image.display(), tree.len());
    Ok(())
}
