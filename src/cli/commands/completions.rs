//! Completions command - print a shell completion script.

use clap::Command;
use clap_complete::{generate, Shell};
use std::io;

/// Arguments for the completions command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    litaudit completions bash > ~/.local/share/bash-completion/completions/litaudit\n    \
    litaudit completions zsh > ~/.zfunc/_litaudit\n    \
    litaudit completions fish > ~/.config/fish/completions/litaudit.fish")]
pub struct Args {
    /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
    #[arg(value_name = "SHELL", value_enum)]
    pub shell: Shell,
}

/// Writes the completion script for `shell` to stdout.
///
/// Called from main.rs, which owns the `Cli` definition.
pub fn generate_completions(cmd: &mut Command, shell: Shell) {
    generate(shell, cmd, "litaudit", &mut io::stdout());
}
