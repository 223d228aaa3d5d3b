use crate::cli::args::{Args, Command, ConnectArgs, LineEnding};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::ports::PortEnumerator;
use crate::core::session::{EventReceiver, SessionEvent, SessionManager, SessionOptions};
use crate::core::text;
use crate::core::watcher::DeviceChangeWatcher;
use crate::domain::config::SerialTermConfig;
use crate::domain::error::{CloseError, OpenError, SerialTermError, SerialTermResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{PollingDeviceSource, SerialBackend, SystemBackend};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// How an interactive session came to an end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Standard input reached end of file
    InputClosed,
    /// The shutdown signal fired
    Interrupted,
    /// The device was unplugged
    Dropped { device: String },
}

/// Execute CLI command
pub async fn execute_command(args: Args) -> SerialTermResult<()> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new();
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    if !args.quiet {
        init_logging(&config.global, args.verbose)?;
    }

    let backend: Arc<dyn SerialBackend> =
        Arc::new(SystemBackend::new().with_timeout(config.global.io_timeout()));

    match args.command {
        Command::Ports => {
            let ports = PortEnumerator::new(backend).list_ports();
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Connect(connect) => execute_connect(connect, &config, backend, &writer).await,
        Command::Version => {
            writer.write_message(&format!("serialterm {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

async fn execute_connect(
    args: ConnectArgs,
    config: &SerialTermConfig,
    backend: Arc<dyn SerialBackend>,
    writer: &ConsoleWriter,
) -> SerialTermResult<()> {
    let session_config = args.session_config(&config.serial);
    let options = SessionOptions {
        receive_poll_interval: config.global.receive_poll_interval(),
    };

    let (manager, events) = SessionManager::with_options(Arc::clone(&backend), options);
    let manager = Arc::new(manager);

    if let Err(e) = manager.open(session_config.clone()).await {
        if matches!(e, OpenError::DeviceUnavailable { .. }) {
            writer.write_ports(&manager.ports())?;
        }
        return Err(e.into());
    }
    writer.write_status(&format!("Connected to {}", session_config))?;

    let source = PollingDeviceSource::new(backend, config.global.hotplug_poll_interval());
    let watcher = DeviceChangeWatcher::new(Arc::clone(&manager)).spawn(source);

    let stdin = BufReader::new(tokio::io::stdin());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let end = run_session(
        &manager,
        events,
        stdin,
        tokio::io::stdout(),
        args.eol,
        shutdown,
    )
    .await;
    watcher.abort();

    finish_session(&manager, end, writer).await
}

/// Close the session however the interactive loop ended
///
/// A loop error is returned only after the session has been closed.
pub async fn finish_session<O: OutputWriter>(
    manager: &SessionManager,
    end: SerialTermResult<SessionEnd>,
    writer: &O,
) -> SerialTermResult<()> {
    let closed = match &end {
        Ok(SessionEnd::Dropped { device }) => {
            writer.write_status(&format!("Device '{}' was removed; session closed", device))?;
            Ok(())
        }
        _ => match manager.close().await {
            Ok(()) => {
                info!("Session closed by operator");
                Ok(())
            }
            Err(CloseError::NotOpen) => {
                debug!("Session was already closed");
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    writer.write_statistics(&manager.statistics().await)?;

    end?;
    closed?;
    Ok(())
}

/// Strip the line terminator and decode what is left
fn take_line(pending: &mut Vec<u8>) -> String {
    if pending.last() == Some(&b'\n') {
        pending.pop();
        if pending.last() == Some(&b'\r') {
            pending.pop();
        }
    }
    let line = text::decode(pending);
    pending.clear();
    line
}

/// Pump lines from `input` to the session and session text to `output`
///
/// Returns when input is exhausted, `shutdown` completes, or the session is
/// dropped by the device going away. The session itself is left as is.
/// Input that is not valid UTF-8 is decoded lossily, like received text.
pub async fn run_session<R, W, F>(
    manager: &SessionManager,
    mut events: EventReceiver,
    mut input: R,
    mut output: W,
    eol: LineEnding,
    shutdown: F,
) -> SerialTermResult<SessionEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    // Partial lines survive a cancelled read_until in here.
    let mut pending = Vec::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            read = input.read_until(b'\n', &mut pending) => {
                let read = read?;
                if read == 0 && pending.is_empty() {
                    return Ok(SessionEnd::InputClosed);
                }
                if read == 0 || pending.last() == Some(&b'\n') {
                    let text = format!("{}{}", take_line(&mut pending), eol.as_str());
                    if let Err(e) = manager.send(&text).await {
                        warn!("{}", e);
                    }
                }
                if read == 0 {
                    return Ok(SessionEnd::InputClosed);
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::TextReceived(text)) => {
                    output.write_all(text.as_bytes()).await?;
                    output.flush().await?;
                }
                Some(SessionEvent::SessionDropped { device }) => {
                    return Ok(SessionEnd::Dropped { device });
                }
                Some(SessionEvent::PortsChanged(ports)) => {
                    let names: Vec<_> = ports.iter().map(|p| p.identifier.as_str()).collect();
                    info!("Available ports: {}", names.join(", "));
                }
                None => {
                    return Err(SerialTermError::InvalidInput(
                        "session event stream closed".to_string(),
                    ))
                }
            },
            _ = &mut shutdown => return Ok(SessionEnd::Interrupted),
        }
    }
}
