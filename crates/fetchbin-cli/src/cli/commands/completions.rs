//! `fetchbin completions` – shell completion scripts.

use clap_complete::Shell;

pub fn run_completions(shell: Shell, cmd: &mut clap::Command) {
    clap_complete::generate(shell, cmd, "fetchbin", &mut std::io::stdout());
}
