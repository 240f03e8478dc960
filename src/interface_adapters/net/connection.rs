// One peer socket: a writer task draining an outbound queue in post order and
// a read half that is driven directly during setup and by a reader task once
// ticks start.

use crate::interface_adapters::net::framer::{FrameReader, encode};
use crate::use_cases::LockstepError;
use crate::use_cases::lockstep::{Fault, TickMessages};

use std::{net::SocketAddr, sync::Arc};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct TickReads {
    requests: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

pub struct PeerConnection {
    name: String,
    remote: SocketAddr,
    local: SocketAddr,
    reader: Option<FrameReader<OwnedReadHalf>>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    writer: JoinHandle<()>,
    tick_reads: Option<TickReads>,
    closed: bool,
}

impl PeerConnection {
    /// Wraps a connected socket and starts its writer. Must be called from
    /// inside the runtime.
    pub fn spawn(stream: TcpStream, name: impl Into<String>, fault: Arc<Fault>) -> Result<Self, LockstepError> {
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        let local = stream.local_addr()?;
        let name = name.into();

        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(write, rx, fault, remote));

        debug!(peer = %name, %remote, "peer connected");
        Ok(Self {
            name,
            remote,
            local,
            reader: Some(FrameReader::new(read)),
            outbound: Some(tx),
            writer,
            tick_reads: None,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local(&self) -> SocketAddr {
        self.local
    }

    /// Queues one frame. Fails only if the body is too large or the
    /// connection is already closed.
    pub fn post(&self, body: &[u8]) -> Result<(), LockstepError> {
        let frame = encode(body)?;
        let Some(outbound) = &self.outbound else {
            return Err(LockstepError::LogicError(format!("post to closed peer {}", self.name)));
        };
        outbound
            .send(frame)
            .map_err(|_| LockstepError::LogicError(format!("writer for peer {} has stopped", self.name)))
    }

    /// Reads the next frame directly. Only valid before tick reads start.
    pub async fn recv(&mut self) -> Result<Vec<u8>, LockstepError> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            LockstepError::LogicError(format!("peer {} is no longer readable", self.name))
        })?;
        Ok(reader.read_frame().await?)
    }

    /// Hands the read half to a task that reads one frame per request and
    /// files it under this peer's name.
    pub fn start_tick_reads(
        &mut self,
        handle: &Handle,
        messages: Arc<TickMessages>,
        fault: Arc<Fault>,
    ) -> Result<(), LockstepError> {
        let mut reader = self.reader.take().ok_or_else(|| {
            LockstepError::LogicError(format!("tick reads already started for peer {}", self.name))
        })?;
        let (requests, mut request_rx) = mpsc::unbounded_channel::<()>();
        let name = self.name.clone();

        let task = handle.spawn(async move {
            while request_rx.recv().await.is_some() {
                match reader.read_frame().await {
                    Ok(body) => {
                        trace!(peer = %name, len = body.len(), "tick message");
                        messages.insert(&name, body);
                    }
                    Err(e) => {
                        fault.raise(e.into());
                        break;
                    }
                }
            }
        });

        self.tick_reads = Some(TickReads { requests, task });
        Ok(())
    }

    /// Asks the reader task for the next frame.
    pub fn request_frame(&self) -> bool {
        self.tick_reads
            .as_ref()
            .is_some_and(|reads| reads.requests.send(()).is_ok())
    }

    /// Stops reading and lets the writer flush what is queued, then shut the
    /// socket. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.outbound = None;
        self.reader = None;
        if let Some(reads) = self.tick_reads.take() {
            reads.task.abort();
        }
        debug!(peer = %self.name, "peer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the writer has drained its queue and shut down.
    pub fn is_flushed(&self) -> bool {
        self.writer.is_finished()
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_loop(
    mut write: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    fault: Arc<Fault>,
    remote: SocketAddr,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write.write_all(&frame).await {
            debug!(%remote, error = %e, "peer write failed");
            fault.raise(e.into());
            return;
        }
    }
    let _ = write.shutdown().await;
}
