use crate::utils::{CpioEntry, Node, Tree};
use chrono::DateTime;
use colored::Colorize;

fn push_prefix(out: &mut String, level: usize) {
    for i in 0..level {
        out.push_str(if i + 1 == level { "|-" } else { "| " });
    }
}

fn render_dir(out: &mut String, name: &str, node: &Node, level: usize, max_depth: usize) {
    push_prefix(out, level);
    out.push_str(&format!("{name}/").blue().bold().to_string());
    if level >= max_depth {
        out.push_str(" [...]\n");
        return;
    }
    out.push('\n');

    for (child_name, child) in node.subdirs() {
        render_dir(out, child_name, child, level + 1, max_depth);
    }
    for (file_name, entry) in node.files() {
        push_prefix(out, level + 1);
        if entry.is_symlink() {
            out.push_str(&file_name.cyan().to_string());
        } else {
            out.push_str(file_name);
        }
        out.push('\n');
    }
}

/// Draws the hierarchy below the root, cutting directories deeper than
/// `max_depth` short with `[...]`.
pub fn render_tree(tree: &Tree, max_depth: usize) -> String {
    let mut out = String::new();
    render_dir(&mut out, ".", tree.root(), 0, max_depth);
    out
}

fn format_mtime(mtime: u64) -> String {
    i64::try_from(mtime)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `ls -l` style lines: octal mode, links, size, mtime (UTC) and name.
pub fn render_entries(entries: &[&CpioEntry]) -> String {
    let links_width = entries
        .iter()
        .map(|e| e.link_count.to_string().len())
        .max()
        .unwrap_or(1);
    let size_width = entries
        .iter()
        .map(|e| e.size().to_string().len())
        .max()
        .unwrap_or(1);

    let mut out = String::new();
    for entry in entries {
        let name = entry.base_name();
        let label = if entry.is_dir() {
            format!("{name}/").blue().bold().to_string()
        } else if entry.is_symlink() {
            format!(
                "{} -> {}",
                name.cyan(),
                String::from_utf8_lossy(&entry.payload)
            )
        } else {
            name.to_string()
        };

        out.push_str(&format!(
            "{:06o} {:>links_width$} {:>size_width$} {} {}\n",
            entry.mode,
            entry.link_count,
            entry.size(),
            format_mtime(entry.mtime),
            label
        ));
    }
    out
}
