//! Subcommand dispatch.
//!
//! [`dispatch`] routes a parsed command line to [`run`] or [`validate`].

pub mod run;
pub mod validate;

use clap::ArgMatches;

use crate::cli::{Commands, Parsed};
use crate::error::GroundworkError;
use crate::options::{Options, ServerOptions};

pub async fn dispatch(parsed: Parsed) -> Result<(), GroundworkError> {
    let Parsed { cli, matches } = parsed;
    let sub = matches.subcommand().map(|(_, m)| m);
    match (cli.command, sub) {
        (Some(Commands::Run(args)), Some(sub)) => run::execute(args, sub).await,
        (Some(Commands::Validate(ref args)), Some(sub)) => validate::execute(args, sub),
        _ => {
            print_welcome();
            Ok(())
        }
    }
}

/// Options from `path` (or defaults) with explicit flags applied on top.
pub fn load_options(
    path: Option<&std::path::Path>,
    matches: &ArgMatches,
) -> Result<ServerOptions, GroundworkError> {
    let mut opts = match path {
        Some(path) => ServerOptions::from_file(path)?,
        None => ServerOptions::default(),
    };
    opts.apply_matches(matches, ServerOptions::PREFIX);
    Ok(opts)
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  groundwork v{version}\n\n  \
         No command provided. To get started:\n\n    \
         groundwork run -c groundwork.yaml     Start the HTTP service\n    \
         groundwork validate groundwork.yaml   Check an options file\n    \
         groundwork --help                     See all commands and options\n"
    );
}
