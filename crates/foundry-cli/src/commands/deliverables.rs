use colored::Colorize;
use foundry_core::wizard::DeliverableKind;

pub fn list() {
    for kind in DeliverableKind::all() {
        println!("{:<24} {}", kind.to_string().cyan(), kind.title().bold());
        println!("{:<24} {}", "", kind.summary().dimmed());
    }
}
