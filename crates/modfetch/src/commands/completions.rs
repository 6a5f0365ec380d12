//! `modfetch completions <shell>` — shell completion generation via
//! `clap_complete`, consistent with the teacher's existing workspace
//! dependency (SPEC_FULL.md 2: "Shell completions").

use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{App, CompletionsArgs};

pub fn run(args: &CompletionsArgs) {
    let mut cmd = App::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut std::io::stdout());
}
