//! Meta commands: shell completions.

use std::io;

use clap::CommandFactory;

use crate::Cli;

/// Print completion definitions for `shell` to stdout.
pub fn handle_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "foreman", &mut io::stdout());
}
