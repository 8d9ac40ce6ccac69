use anyhow::Result;
use clap::Parser;

mod args;
mod boot;
mod cmd;
mod output;

fn main() -> Result<()> {
    let cli = args::Cli::parse();
    output::init(cli.json);

    cmd::dispatch(cli)
}
