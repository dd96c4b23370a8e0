use std::process::ExitCode;

use anyhow::Result;
use clap::{Error as ClapError, Parser as _};

use crate::atlas_args::AtlasArgs;

mod atlas_args;
mod commands;

fn main() -> ExitCode {
    if let Err(error) = try_main() {
        error.downcast_ref().map(ClapError::exit);
        eprintln!("{error:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    let args = AtlasArgs::try_parse()?;

    binary_utils::initialize_logger(args.log_level.parse()?)?;

    commands::run(args.command)
}
