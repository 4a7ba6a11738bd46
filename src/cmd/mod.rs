//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each handler
//! lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::WeeproxyError;

pub async fn dispatch(cli: Cli) -> Result<(), WeeproxyError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  weeproxy v{version}: rate-limiting, circuit-breaking reverse proxy\n\n  \
         No command provided. To get started:\n\n    \
         weeproxy run                      Start the proxy with ./sample-config.json\n    \
         weeproxy run -c proxy.json        Start with a specific config file\n    \
         weeproxy validate proxy.json      Check a config file\n    \
         weeproxy --help                   See all commands and options\n"
    );
}
