use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::PACKAGE, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().label.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().label.clone()), value);
}

/// One line of a prototype chain, indented by its distance from the start
pub fn chain_entry(depth: usize, name: &str, type_id: &str) {
    println!(
        "{}{} {} ({})",
        "  ".repeat(depth),
        Icons::LINK,
        name.style(theme().type_name.clone()),
        type_id.style(theme().id.clone())
    );
}
