use clap::ArgMatches;
use colored::Colorize;
use initramfs_man::cli;
use initramfs_man::commands::{cat, create, image_options, list, modify, parse_ops, tree};
use std::{path::PathBuf, process};
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn path_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a PathBuf {
    matches
        .get_one::<PathBuf>(id)
        .expect("required arguments are enforced by clap")
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .expect("required arguments are enforced by clap")
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let result = match matches.subcommand() {
        Some(("tree", sub_matches)) => tree(
            path_arg(sub_matches, "image"),
            sub_matches.get_one::<usize>("depth").copied(),
        ),
        Some(("list", sub_matches)) => list(
            path_arg(sub_matches, "image"),
            string_arg(sub_matches, "path"),
        ),
        Some(("cat", sub_matches)) => cat(
            path_arg(sub_matches, "image"),
            string_arg(sub_matches, "path"),
        ),
        Some(("create", sub_matches)) => create(
            path_arg(sub_matches, "dir"),
            path_arg(sub_matches, "image"),
            &image_options(sub_matches),
        ),
        Some(("modify", sub_matches)) => {
            let raw_ops: Vec<String> = sub_matches
                .get_many::<String>("ops")
                .into_iter()
                .flatten()
                .cloned()
                .collect();

            parse_ops(&raw_ops).and_then(|ops| {
                modify(
                    path_arg(sub_matches, "image"),
                    &ops,
                    sub_matches.get_one::<PathBuf>("output").map(PathBuf::as_path),
                    &image_options(sub_matches),
                )
            })
        }
        _ => unreachable!("Unknown subcommand!"),
    };

    if let Err(err) = result {
        eprintln!("{}", err.to_string().red());
        process::exit(1);
    }
}
