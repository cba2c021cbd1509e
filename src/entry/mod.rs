use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::debug;

use crate::app::{run_bulk_command, run_chain, run_compare, run_load};
use crate::args::{Cli, Command};
use crate::error::AppResult;
use crate::shutdown::shutdown_channel;
use crate::shutdown_handlers::setup_signal_shutdown_handler;
use crate::system::logger::init_logging;

/// Parses the command line and runs the chosen subcommand on a
/// multi-threaded runtime. `Ok(false)` means the command ran but did not
/// pass (failed assertions, cancelled run, failed chain step).
///
/// # Errors
///
/// Returns configuration, transport-setup and report errors from the
/// subcommand.
pub fn run() -> AppResult<bool> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    init_logging(cli.verbose, cli.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(&cli, &matches))
}

async fn run_async(cli: &Cli, matches: &ArgMatches) -> AppResult<bool> {
    let sub_matches = matches.subcommand().map_or(matches, |(_, sub)| sub);
    let (shutdown_tx, _shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let result = match &cli.command {
        Command::Run(args) => run_load(args, sub_matches, cli.no_color, &shutdown_tx).await,
        Command::Chain(args) => run_chain(args, sub_matches, &shutdown_tx).await,
        Command::Bulk(args) => run_bulk_command(args, sub_matches, &shutdown_tx).await,
        Command::Compare(args) => run_compare(args).await.map(|()| true),
    };

    signal_handle.abort();
    debug!("Command finished");
    result
}
