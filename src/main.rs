//! `taskwatch` - watch batch operations and notify on state changes.
//!
//! See `README.md` for user documentation and `DESIGN.md` for architecture.

use clap::Parser;

use taskwatch::cli::{Cli, Command};
use taskwatch::config::Config;
use taskwatch::exit_codes::exit;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = taskwatch::logging::init_logging(cli.verbose) {
        eprintln!("warning: {err:#}");
    }

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    if let Command::Schema = cli.command {
        return taskwatch::engine::schema();
    }
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Schema => taskwatch::engine::schema(),
        Command::Start(args) => taskwatch::engine::start(args, &config),
        Command::Tasks(args) => taskwatch::engine::tasks(args, &config),
        Command::Test(args) => taskwatch::engine::test(args, &config),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<taskwatch::Error>() {
        Some(e) if e.is_config() => exit::CONFIG_FAILURE,
        _ => exit::OPERATIONAL_FAILURE,
    }
}
