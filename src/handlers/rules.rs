//! Handler for the `rules` command.

use crate::analyzer::stig::rules::{codes, rule_name};
use crate::error::Result;
use colored::Colorize;

/// Rule catalog as printable lines.
pub fn format_rule_list() -> String {
    let mut output = String::new();
    for id in codes::ALL {
        output.push_str(&format!("{}  {}\n", id.bright_cyan(), rule_name(id)));
    }
    output
}

/// Handle the `rules` command.
pub fn handle_rules() -> Result<()> {
    print!("{}", format_rule_list());
    Ok(())
}
