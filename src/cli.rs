use crate::commands::{
    get_cat_command, get_create_command, get_list_command, get_modify_command, get_tree_command,
};
use clap::{Arg, ArgAction, Command};

pub fn cli() -> Command {
    Command::new("irfs")
        .about("Inspect, create and edit initramfs images (gzipped cpio newc archives)")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .allow_external_subcommands(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log decoding and encoding details to stderr"),
        )
        .subcommand(get_tree_command())
        .subcommand(get_list_command())
        .subcommand(get_cat_command())
        .subcommand(get_create_command())
        .subcommand(get_modify_command())
}
