use clap::Parser;

use crate::error::{AppError, AppResult};

use super::{Cli, Command, RunArgs};

pub(crate) fn parse_test_args<I, T>(args: I) -> AppResult<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(AppError::from)
}

pub(crate) fn parse_run_args(extra: &[&str]) -> AppResult<RunArgs> {
    let mut argv = vec!["loadlens", "run"];
    argv.extend_from_slice(extra);
    let cli = parse_test_args(argv)?;
    let Command::Run(run) = cli.command else {
        return Err(AppError::validation("Expected run subcommand"));
    };
    Ok(*run)
}
