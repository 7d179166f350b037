// gitdoc CLI entry point.

use clap::Parser;

mod commands;
mod exit_code;
mod output;
mod prompt;

use exit_code::ExitCode;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "gitdoc", about = "Automatic commits and sync for git working trees")]
struct Cli {
    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::detect(cli.json);
    match commands::run(cli.command, format).await {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            ExitCode::from_error(&error).into()
        }
    }
}
