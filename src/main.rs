use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use corpuscheck::cli::{self, Cli};
use corpuscheck::engine::report::EXIT_FATAL;
use corpuscheck::ui::output;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.log_level());

    let code = match cli::run(cli) {
        Ok(code) => code,
        Err(err) => {
            output::error(format!("{err:#}"));
            EXIT_FATAL
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(2))
}
