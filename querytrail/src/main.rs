mod cli;
mod run;

use crate::cli::{Cli, Command, check};
use anyhow::Result;
use clap::Parser;
use querytrail_core::logging::{default_log_format, init_logging};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Check { file }) => {
            init_logging(default_log_format());
            check(&file)
        }

        None => {
            init_logging(
                cli.run
                    .log_format
                    .map_or_else(default_log_format, Into::into),
            );

            let cfg = cli.run.into_config()?;
            run::run(cfg)
        }
    }
}
