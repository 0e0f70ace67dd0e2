use clap::Parser;
use env_logger::Env;
use std::io::IsTerminal;
use std::process::ExitCode;
use v2h::cli::Cli;
use v2h::commands;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let mut cli = Cli::parse();
    if !std::io::stdout().is_terminal() || std::env::var_os("NO_COLOR").is_some() {
        cli.no_color = true;
    }

    let mut out = std::io::stdout();
    match commands::run(cli, &mut out).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
