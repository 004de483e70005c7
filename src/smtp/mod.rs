//! The SMTP sink: a per-connection transaction driver plus the
//! process-wide capture queue and accept loop that feed it.
//!
//! The protocol interpreter itself ([`action`], [`engine`], [`message`])
//! is pure and connection-local; this module is where line I/O, task
//! spawning and the shared queue live, mirroring how the teacher's
//! `smtp::Server`/`handle_connection` split keeps the protocol state
//! machine separate from socket lifetime management.

mod action;
mod engine;
mod error;
mod message;
mod queue;

pub use action::Action;
pub use engine::{execute, Response, ResponseKind, State};
pub use error::ProtocolViolation;
pub use message::{Assembler, Message};
pub use queue::CaptureQueue;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, trace};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use action::classify;
use crate::config::Config;

/// How long `Server::stop` waits for in-flight transactions to finish
/// before abandoning them (spec §5).
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(20);

/// Drives a single accepted connection through the full command/response
/// state machine, from the initial greeting to QUIT.
pub struct Connection<R, W> {
    reader: R,
    writer: W,
    state: State,
    auth_enabled: bool,
    hostname: String,
}

impl<R, W> Connection<R, W>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    pub fn new(reader: R, writer: W, hostname: impl Into<String>, auth_enabled: bool) -> Self {
        Connection {
            reader,
            writer,
            state: State::Connect,
            auth_enabled,
            hostname: hostname.into(),
        }
    }

    /// Runs the transaction driver sequence of spec §4.4 and returns every
    /// message captured on this connection, in transaction order.
    pub async fn handle(&mut self) -> Result<Vec<Message>> {
        let mut assembler = Assembler::new();
        let mut messages = Vec::new();

        let greeting = execute(Action::Connect, self.state);
        self.transmit(&greeting).await?;
        assembler.store(&greeting, None)?;
        self.state = greeting.next_state;

        while self.state != State::Connect {
            trace!("smtp({:?}): waiting for a line", self.state);
            let Some(line) = self.read_line().await? else {
                info!("connection closed by peer mid-transaction");
                break;
            };
            trace!("smtp({:?}): read {:?}", self.state, line);

            let (action, params) = classify(&line, self.state, self.auth_enabled);
            let response = execute(action, self.state);
            debug!(
                "smtp({:?}): {:?} -> {:?} (next {:?})",
                self.state, action, response.kind, response.next_state
            );

            self.transmit(&response).await?;
            assembler.store(&response, params.as_deref())?;

            let completed = action == Action::DataEnd && response.next_state == State::Quit;
            self.state = response.next_state;

            if completed {
                let message = assembler.finish();
                info!(
                    "captured message, subject {:?}",
                    message.header_value("Subject").unwrap_or_default()
                );
                messages.push(message);
            }
        }

        Ok(messages)
    }

    /// Reads one line, stripped of its trailing CRLF/LF. `None` means the
    /// peer closed the connection (zero bytes read); an empty `Some("")`
    /// is a legitimate blank line, which matters during DATA_BODY.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buffer = String::new();
        let bytes_read = self.reader.read_line(&mut buffer).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        Ok(Some(buffer.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Writes a response to the wire, unless it is [`ResponseKind::Silent`].
    /// The 220 greeting and 221 closing text are the only messages the
    /// table host-qualifies; the engine keeps them static and this is
    /// where the configured hostname gets spliced in.
    async fn transmit(&mut self, response: &Response) -> Result<()> {
        let Some(line) = response.wire_line() else {
            return Ok(());
        };
        let line = match response.kind {
            ResponseKind::Transmit(220, text) => format!("220 {} {}", self.hostname, text),
            ResponseKind::Transmit(221, text) => format!("221 {} {}", self.hostname, text),
            _ => line,
        };
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        self.writer.flush().await.map_err(Into::into)
    }
}

struct ServerInner {
    queue: Arc<CaptureQueue>,
    cancel: CancellationToken,
    tasks: AsyncMutex<JoinSet<()>>,
}

/// The embedded SMTP sink server (spec §6 "Embedded API").
pub struct Server {
    port: u16,
    inner: Arc<ServerInner>,
    accept_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Server {
    /// Binds and begins accepting immediately, returning once bound.
    /// Port `0` requests an OS-assigned ephemeral port, recoverable
    /// afterward via [`Server::port`].
    pub async fn start(config: Config) -> Result<Self> {
        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!("smtp sink listening on {}:{}", config.bind_address, port);

        let inner = Arc::new(ServerInner {
            queue: Arc::new(CaptureQueue::new()),
            cancel: CancellationToken::new(),
            tasks: AsyncMutex::new(JoinSet::new()),
        });

        let accept_inner = Arc::clone(&inner);
        let hostname = config.hostname.clone();
        let auth_enabled = config.auth_enabled;
        let accept_task = tokio::spawn(async move {
            accept_loop(listener, accept_inner, hostname, auth_enabled).await;
        });

        Ok(Server {
            port,
            inner,
            accept_task: AsyncMutex::new(Some(accept_task)),
        })
    }

    /// Starts a sink on `port` with otherwise-default configuration, per
    /// the minimal embedded API contract in spec §6.
    pub async fn start_on(port: u16) -> Result<Self> {
        Self::start(Config::with_port(port)).await
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// A live handle to the capture queue; destructive reads allowed.
    pub fn received(&self) -> Arc<CaptureQueue> {
        Arc::clone(&self.inner.queue)
    }

    /// A non-destructive copy of every message captured so far.
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.queue.snapshot()
    }

    /// Empties the capture queue.
    pub fn reset(&self) {
        self.inner.queue.clear();
    }

    /// Idempotent. Closes the listener, waits up to 20s for in-flight
    /// transactions, then returns; stragglers past the timeout are
    /// abandoned in place.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.accept_task.lock().await.take() {
            let _ = handle.await;
        }

        let drain = async {
            let mut tasks = self.inner.tasks.lock().await;
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, drain).await.is_err() {
            error!("smtp sink: abandoning in-flight connections after shutdown timeout");
        }
    }
}

async fn accept_loop(listener: TcpListener, inner: Arc<ServerInner>, hostname: String, auth_enabled: bool) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => {
                info!("smtp sink: accept loop stopping");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!("new connection from {}", addr);
                        let queue = Arc::clone(&inner.queue);
                        let hostname = hostname.clone();
                        let mut tasks = inner.tasks.lock().await;
                        tasks.spawn(async move {
                            if let Err(e) = handle_connection(stream, queue, hostname, auth_enabled).await {
                                error!("error handling connection from {}: {:#}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("error accepting connection: {:?}", e);
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    queue: Arc<CaptureQueue>,
    hostname: String,
    auth_enabled: bool,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let reader = tokio::io::BufReader::new(read_half);
    let writer = tokio::io::BufWriter::new(write_half);
    let mut connection = Connection::new(reader, writer, hostname, auth_enabled);

    let messages = connection.handle().await?;
    queue.offer_all(messages);

    info!("closing connection");
    Ok(())
}
