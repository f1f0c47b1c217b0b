mod args;
mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use args::{CliArgs, CliCommand};
use config::CliConfig;
use roost_client::recipes;
use roost_client::{
    Acl, Connection, ConnectionManager, CreateFlags, WatchNotice,
};
use roost_helpers::{logging, shutdown};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EX_TEMPFAIL: u8 = 75;
const EX_USAGE: u8 = 64;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    logging::init_logging("roost=info", "ROOST_LOG");

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("roost-cli error: {message}");
            return ExitCode::from(EX_USAGE);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roost-cli error: {err:#}");
            ExitCode::from(EX_TEMPFAIL)
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let config = CliConfig::load(args.config_path.as_deref())
        .context("failed to load configuration")?;
    let servers = config.server_specs(args.server.as_deref())?;

    let stop = CancellationToken::new();
    tokio::spawn(shutdown::listen_shutdown(stop.clone()));

    let manager =
        ConnectionManager::with_options(servers, config.connect_options());
    // a shutdown signal tears the session down through the monitor binding
    let conn = manager
        .start_connection(None, vec![stop.clone()])
        .await
        .context("failed to establish session")?;
    debug!("session ready: session_id={:#x}", conn.session_id());

    let result = execute(&conn, args.command, &stop).await;
    manager.shutdown();
    result
}

async fn execute(
    conn: &Connection,
    command: CliCommand,
    stop: &CancellationToken,
) -> Result<()> {
    match command {
        CliCommand::Get { path } => {
            let (data, stat) = conn.get(&path).await?;
            debug!("node read: path={path}, version={}", stat.version);
            println!("{}", String::from_utf8_lossy(&data));
        }
        CliCommand::Set { path, data } => {
            let stat = conn.set(&path, data.as_bytes()).await?;
            println!("version={}", stat.version);
        }
        CliCommand::Create { path, data, ephemeral, sequential } => {
            let mut flags = CreateFlags::empty();
            flags.set(CreateFlags::EPHEMERAL, ephemeral);
            flags.set(CreateFlags::SEQUENTIAL, sequential);
            let created = conn
                .create(
                    &path,
                    data.as_bytes(),
                    flags,
                    vec![Acl::open_unsafe()],
                )
                .await?;
            println!("{created}");
        }
        CliCommand::Delete { path } => {
            conn.delete(&path).await?;
        }
        CliCommand::DeleteAll { path } => {
            recipes::delete_all(conn, &path).await?;
        }
        CliCommand::Ls { path } => {
            for child in conn.ls(&path).await? {
                println!("{child}");
            }
        }
        CliCommand::Ls2 { path } => {
            let (children, stat) = conn.ls2(&path).await?;
            for child in &children {
                println!("{child}");
            }
            println!(
                "cversion={} num_children={}",
                stat.cversion, stat.num_children
            );
        }
        CliCommand::Watch { path } => {
            let (sink, mut notices) = mpsc::unbounded_channel();
            let (data, _) = conn.get_w(&path, sink, 0).await?;
            println!("{}", String::from_utf8_lossy(&data));
            wait_for_notice(&mut notices, stop).await;
        }
        CliCommand::WatchChildren { path } => {
            let (sink, mut notices) = mpsc::unbounded_channel();
            for child in conn.ls_w(&path, sink, 0).await? {
                println!("{child}");
            }
            wait_for_notice(&mut notices, stop).await;
        }
        CliCommand::EnsurePath { path } => {
            recipes::ensure_path(conn, &path).await?;
        }
    }
    Ok(())
}

async fn wait_for_notice(
    notices: &mut mpsc::UnboundedReceiver<WatchNotice>,
    stop: &CancellationToken,
) {
    tokio::select! {
        _ = stop.cancelled() => {}
        maybe_notice = notices.recv() => match maybe_notice {
            Some(WatchNotice::Fired { path, kind, .. }) => {
                println!("event: kind={kind}, path={path}");
            }
            Some(WatchNotice::Lost { path, kind, .. }) => {
                println!("watch lost: kind={kind}, path={path}");
            }
            None => {}
        },
    }
}
