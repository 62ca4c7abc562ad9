//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use fleetroute_cli::CliError;

#[expect(clippy::print_stderr, reason = "the binary reports fatal errors on stderr")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
    if let Err(err) = fleetroute_cli::run() {
        if let CliError::ArgumentParsing(parse) = &err {
            parse.exit();
        }
        eprintln!("fleetroute: {err}");
        std::process::exit(1);
    }
}
