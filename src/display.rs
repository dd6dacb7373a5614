//! Status display collaborator
//!
//! The orchestrator pushes a short human-readable line on every state
//! transition; what renders it is deployment-specific.

/// Renders pipeline status for the operator
pub trait StatusDisplay {
    /// Show a short status message, replacing the previous one
    fn show(&mut self, text: &str);
}

/// Prints status lines to stdout when no panel hardware is attached
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl StatusDisplay for ConsoleDisplay {
    fn show(&mut self, text: &str) {
        for line in text.lines() {
            println!("| {line}");
        }
        tracing::debug!(status = %text.replace('\n', " / "), "display updated");
    }
}
