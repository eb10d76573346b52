use anyhow::Result;
use clap::Parser;
use dirsort::cli::{self, Cli};
use dirsort::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    cli::run(&cli)
}
