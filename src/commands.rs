//! Command dispatch: maps each CLI verb onto the client, poller and renderers.

use crate::accumulator::Snapshot;
use crate::catalog::Catalog;
use crate::cli::{Cli, Command, Edt};
use crate::client::{ClientOptions, EchonetClient};
use crate::config::{Config, ConfigState};
use crate::error::{Result, V2hError};
use crate::poller::{EPC_POWER, Poller, STATUS_PROPERTIES};
use crate::protocol::{CONTROLLER_EOJ, Eoj, ServiceCode, V2H_EOJ};
use crate::render::{CsvRenderer, InteractiveRenderer, MessageRenderer};
use crate::status::StatusReport;
use chrono::Utc;
use clap::CommandFactory;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use futures_util::StreamExt;
use log::{info, warn};
use std::future::Future;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

pub const POWER_ON: u8 = 0x30;
pub const POWER_OFF: u8 = 0x31;

const PROGRESS_LINE: &str = "Fetching V2H values...";

/// How a command invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// No verb was given; usage was printed
    Help,
    /// First run: a placeholder config was written and nothing was sent
    ConfigCreated(PathBuf),
}

/// Run one CLI invocation, writing user-facing output to `out`.
///
/// `watch` runs until Ctrl-C.
pub async fn run<W: Write>(cli: Cli, out: &mut W) -> Result<Outcome> {
    run_until(cli, out, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Like [`run`], with `watch` stopping when `shutdown` completes.
pub async fn run_until<W: Write>(
    cli: Cli,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<Outcome> {
    let Some(command) = cli.command.clone() else {
        write!(out, "{}", Cli::command().render_help())?;
        return Ok(Outcome::Help);
    };

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match Config::load_or_init(&config_path)? {
        ConfigState::Loaded(config) => config,
        ConfigState::Created(path) => {
            warn!("Config file not found");
            writeln!(
                out,
                "Config file not found. Created {}; set \"ip\" to the address of your V2H unit and run again.",
                path.display()
            )?;
            return Ok(Outcome::ConfigCreated(path));
        }
    };

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin()?,
    };
    let color = !cli.no_color;
    let client = EchonetClient::bind(
        ClientOptions::default()
            .with_bind_addr(cli.bind)
            .with_multicast(matches!(command, Command::Watch { .. }))
            .with_device_port(config.port),
    )?;
    let target = IpAddr::V4(config.ip);

    match command {
        Command::On => power(&client, target, true, color, out).await?,
        Command::Off => power(&client, target, false, color, out).await?,
        Command::SendEl {
            deoj,
            esv,
            property,
            value,
        } => send_el(&client, target, deoj, &esv, property, value.as_ref(), out).await?,
        Command::Status { timeout_ms } => {
            let poller = Poller::new(client.clone(), target)
                .with_timeout(Duration::from_millis(timeout_ms));
            status(&poller, &catalog, color, out).await?;
        }
        Command::Watch { csv, dir } => {
            watch(&client, catalog, csv, &dir, color, out, shutdown).await?;
        }
    }

    client.close();
    Ok(Outcome::Done)
}

/// Switch the unit on or off without reading the state back.
pub async fn power<W: Write>(
    client: &EchonetClient,
    target: IpAddr,
    on: bool,
    color: bool,
    out: &mut W,
) -> Result<()> {
    let value = if on { POWER_ON } else { POWER_OFF };
    client
        .send_opc1(
            target,
            CONTROLLER_EOJ,
            V2H_EOJ,
            ServiceCode::SetC,
            EPC_POWER,
            Some(&[value][..]),
        )
        .await?;

    let label = match (on, color) {
        (true, true) => "ON".red().to_string(),
        (false, true) => "OFF".cyan().to_string(),
        (true, false) => "ON".to_string(),
        (false, false) => "OFF".to_string(),
    };
    writeln!(out, "Turning V2H {}.", label)?;
    Ok(())
}

/// Send one arbitrary request.
pub async fn send_el<W: Write>(
    client: &EchonetClient,
    target: IpAddr,
    deoj: Eoj,
    esv: &str,
    property: u8,
    value: Option<&Edt>,
    out: &mut W,
) -> Result<()> {
    let service = resolve_service(esv);
    let tid = client
        .send_opc1(
            target,
            CONTROLLER_EOJ,
            deoj,
            service,
            property,
            value.map(|v| v.0.as_slice()),
        )
        .await?;
    writeln!(
        out,
        "Sent {} to {} property 0x{:02X} (tid {})",
        service, deoj, property, tid
    )?;
    Ok(())
}

/// Map a service name to its code, falling back to GET.
pub fn resolve_service(name: &str) -> ServiceCode {
    ServiceCode::from_name(&name.to_ascii_uppercase()).unwrap_or_else(|| {
        warn!("Unknown service '{}', sending GET", name);
        ServiceCode::Get
    })
}

/// Poll the status properties and print the summary table.
///
/// A progress line is shown while polling; on a terminal it is erased before
/// the table. A partial answer is still printed, with a note naming what is
/// missing.
pub async fn status<W: Write>(
    poller: &Poller,
    catalog: &Catalog,
    color: bool,
    out: &mut W,
) -> Result<Snapshot> {
    write!(out, "{}", PROGRESS_LINE)?;
    out.flush()?;
    let polled = poller.poll(&STATUS_PROPERTIES).await;
    if color {
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    } else {
        writeln!(out)?;
    }

    let snapshot = match polled {
        Ok(snapshot) => snapshot,
        Err(err) => match err {
            V2hError::Incomplete { ref partial, .. } => {
                writeln!(out, "warning: {}", err)?;
                partial.clone()
            }
            _ => return Err(err),
        },
    };

    let report = StatusReport::from_snapshot(&snapshot, catalog, color);
    write!(out, "{}", report.render())?;
    Ok(snapshot)
}

/// Render every inbound message until `shutdown` completes or the transport
/// closes. Returns the number of lines rendered.
pub async fn watch<W: Write>(
    client: &EchonetClient,
    catalog: Catalog,
    csv: bool,
    dir: &Path,
    color: bool,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let launched_at = Utc::now();
    if csv {
        let mut renderer = CsvRenderer::create(dir, launched_at, out)?;
        info!("Logging to {}", renderer.path().display());
        watch_with(client, &mut renderer, shutdown).await
    } else {
        let mut renderer = InteractiveRenderer::new(out, catalog, color);
        renderer.start(launched_at)?;
        watch_with(client, &mut renderer, shutdown).await
    }
}

/// Drive `renderer` from the client's inbound stream.
pub async fn watch_with<R: MessageRenderer + ?Sized>(
    client: &EchonetClient,
    renderer: &mut R,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let stream = client.stream();
    tokio::pin!(stream);
    tokio::pin!(shutdown);

    let mut lines = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Watch stopped");
                break;
            }
            item = stream.next() => match item {
                Some(Ok(inbound)) => {
                    lines += renderer.render(&inbound.message, Utc::now())?;
                }
                Some(Err(e)) => warn!("Discarding inbound frame: {}", e),
                None => break,
            }
        }
    }
    Ok(lines)
}
