mod payment;

use clap::{Arg, ArgMatches, Command};
use klarna_checkout::{config, Checkout, Config, Database};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // If executed in a context where config file is available it is picked
    // up automatically. Otherwise the config file path can still be provided
    // through the `--config` argument.
    let mut config: Config = config::load().unwrap_or_default();

    let matches = cmd().get_matches();

    if let Some(config_path) = matches.get_one::<String>("config") {
        config = config::load_from(config_path)?;
    }
    apply_verbosity(&mut config, &matches)?;

    match matches.subcommand() {
        Some(("serve", _)) => klarna_checkout::axum::start(config).await?,
        Some((name, m)) => {
            klarna_checkout::tracing::init(&config)?;
            let checkout = Checkout::from_config(&config, Database::open(&config.db_path)?)?;
            payment::run(name, m, &checkout).await?;
        }
        None => unreachable!("subcommand is required"),
    }

    Ok(())
}

fn apply_verbosity(config: &mut Config, matches: &ArgMatches) -> anyhow::Result<()> {
    if let Some(level) = matches.get_one::<String>("verbosity") {
        config.tracing.level = level.parse()?;
    }
    Ok(())
}

pub fn cmd() -> Command {
    Command::new("klarna-checkout")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .infer_subcommands(true)
        .version(VERSION)
        .about("Drive storefront payments through Klarna hosted checkout")
        .subcommand(
            Command::new("serve")
                .display_order(1)
                .about("Serve the checkout routes"),
        )
        .subcommands(payment::cmds())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .short('v')
                .display_order(100)
                .value_name("level")
                .default_value("info")
                .value_parser(["trace", "debug", "info", "warn", "error", "none"])
                .global(true)
                .help("Set the verbosity of the log output"),
        )
}
