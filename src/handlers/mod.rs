// Handler modules
pub mod rules;
pub mod run;

// Re-export all handler functions
pub use rules::{format_rule_list, handle_rules};
pub use run::{RunOptions, handle_run};
