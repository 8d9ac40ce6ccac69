use anyhow::Result;

use crate::args::{Cli, Command};

mod console;
mod publish;
mod revision;
mod start;

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Start { site } => start::run(&site),
        Command::Publish { site, changes, logfile } => {
            publish::run(&site, changes.as_deref(), logfile.as_deref())
        }
        Command::Revision { site } => revision::run(&site),
        Command::Console { site } => console::run(&site),
    }
}
