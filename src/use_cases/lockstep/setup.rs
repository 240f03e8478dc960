// Mesh setup. The host names every peer and then walks each pair through
// OPENPORT/CONNECT so that everyone ends up directly connected to everyone.

use super::{CoordinatorPhase, Fault, PhaseSender};
use crate::interface_adapters::net::PeerConnection;
use crate::interface_adapters::protocol::SetupCommand;
use crate::interface_adapters::utils::dump::hex_dump;
use crate::use_cases::LockstepError;

use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connections and local name once setup has completed.
pub struct SetupOutcome {
    pub me: String,
    pub peers: Vec<PeerConnection>,
}

async fn expect(peer: &mut PeerConnection) -> Result<SetupCommand, LockstepError> {
    let frame = peer.recv().await?;
    debug!(peer = %peer.name(), frame = %hex_dump(&frame), "setup frame in");
    SetupCommand::parse(&frame)
}

fn send(peer: &PeerConnection, command: &SetupCommand) -> Result<(), LockstepError> {
    let frame = command.encode();
    debug!(peer = %peer.name(), frame = %hex_dump(&frame), "setup frame out");
    peer.post(&frame)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostStep {
    Accepting,
    Naming { next: usize },
    OpeningPort { i: usize, j: usize },
    Connecting { i: usize, j: usize, port: u16 },
    Beginning,
    Done,
}

struct HostSetup {
    participants: usize,
    listener: TcpListener,
    peers: Vec<PeerConnection>,
    fault: Arc<Fault>,
    phase: PhaseSender,
}

/// Runs the host side until every peer has been told to BEGIN.
pub async fn host_setup(
    listener: std::net::TcpListener,
    participants: usize,
    fault: Arc<Fault>,
    phase: PhaseSender,
) -> Result<SetupOutcome, LockstepError> {
    if participants == 0 {
        return Err(LockstepError::LogicError("a session needs at least one participant".into()));
    }
    let listener = TcpListener::from_std(listener)?;
    let setup = HostSetup {
        participants,
        listener,
        peers: Vec::with_capacity(participants - 1),
        fault,
        phase,
    };
    setup.run().await
}

impl HostSetup {
    async fn run(mut self) -> Result<SetupOutcome, LockstepError> {
        let mut step = HostStep::Accepting;
        while step != HostStep::Done {
            step = match step {
                HostStep::Accepting => self.accept_all().await?,
                HostStep::Naming { next } => self.name_peer(next).await?,
                HostStep::OpeningPort { i, j } => self.open_port(i, j).await?,
                HostStep::Connecting { i, j, port } => self.connect_pair(i, j, port).await?,
                HostStep::Beginning => self.begin()?,
                HostStep::Done => HostStep::Done,
            };
        }
        Ok(SetupOutcome {
            me: self.participants.to_string(),
            peers: self.peers,
        })
    }

    async fn accept_all(&mut self) -> Result<HostStep, LockstepError> {
        self.phase.send_replace(CoordinatorPhase::AwaitingPeers);
        let wanted = self.participants - 1;
        while self.peers.len() < wanted {
            let (stream, remote) = self.listener.accept().await?;
            let name = self.peers.len().to_string();
            info!(peer = %name, %remote, joined = self.peers.len() + 1, wanted, "participant joined");
            self.peers.push(PeerConnection::spawn(stream, name, self.fault.clone())?);
        }
        Ok(if wanted == 0 {
            HostStep::Beginning
        } else {
            HostStep::Naming { next: 0 }
        })
    }

    async fn name_peer(&mut self, next: usize) -> Result<HostStep, LockstepError> {
        self.phase.send_replace(CoordinatorPhase::NamingPeers);
        let init = SetupCommand::Init {
            count: self.participants,
            name: self.peers[next].name().to_string(),
        };
        send(&self.peers[next], &init)?;
        match expect(&mut self.peers[next]).await? {
            SetupCommand::Inited => {}
            other => {
                warn!(peer = next, got = %other, "expected INNITED");
                return Err(LockstepError::UnexpectedMessage);
            }
        }

        Ok(if next + 1 < self.peers.len() {
            HostStep::Naming { next: next + 1 }
        } else {
            self.first_pair()
        })
    }

    fn first_pair(&self) -> HostStep {
        if self.peers.len() >= 2 {
            HostStep::OpeningPort { i: 0, j: 1 }
        } else {
            HostStep::Beginning
        }
    }

    fn pair_after(&self, i: usize, j: usize) -> HostStep {
        let k = self.peers.len();
        if j + 1 < k {
            HostStep::OpeningPort { i, j: j + 1 }
        } else if i + 2 < k {
            HostStep::OpeningPort { i: i + 1, j: i + 2 }
        } else {
            HostStep::Beginning
        }
    }

    // j listens for i.
    async fn open_port(&mut self, i: usize, j: usize) -> Result<HostStep, LockstepError> {
        self.phase.send_replace(CoordinatorPhase::BuildingMesh);
        let order = SetupCommand::OpenPort {
            name: self.peers[i].name().to_string(),
        };
        send(&self.peers[j], &order)?;
        match expect(&mut self.peers[j]).await? {
            SetupCommand::PortOpen { port } => Ok(HostStep::Connecting { i, j, port }),
            other => {
                warn!(peer = j, got = %other, "expected PORTOPEN");
                Err(LockstepError::UnexpectedMessage)
            }
        }
    }

    // i dials the port j just opened.
    async fn connect_pair(&mut self, i: usize, j: usize, port: u16) -> Result<HostStep, LockstepError> {
        let order = SetupCommand::Connect {
            name: self.peers[j].name().to_string(),
            host: self.peers[j].remote().ip().to_string(),
            port,
        };
        send(&self.peers[i], &order)?;
        match expect(&mut self.peers[i]).await? {
            SetupCommand::Connected { address } => {
                debug!(from = i, to = j, %address, "pair connected");
                Ok(self.pair_after(i, j))
            }
            other => {
                warn!(peer = i, got = %other, "expected CONNCTED");
                Err(LockstepError::UnexpectedMessage)
            }
        }
    }

    fn begin(&mut self) -> Result<HostStep, LockstepError> {
        for peer in &self.peers {
            send(peer, &SetupCommand::Begin)?;
        }
        Ok(HostStep::Done)
    }
}

/// Runs the client side: get named by the host, follow its port and connect
/// orders, and stop at BEGIN.
pub async fn client_setup(
    host: String,
    fault: Arc<Fault>,
    phase: PhaseSender,
) -> Result<SetupOutcome, LockstepError> {
    phase.send_replace(CoordinatorPhase::AwaitingPeers);
    let stream = TcpStream::connect(host.as_str()).await?;
    let mut host_conn = PeerConnection::spawn(stream, "host", fault.clone())?;

    phase.send_replace(CoordinatorPhase::NamingPeers);
    let (count, me) = match expect(&mut host_conn).await? {
        SetupCommand::Init { count, name } => (count, name),
        other => {
            warn!(got = %other, "expected INIT");
            return Err(LockstepError::UnexpectedMessage);
        }
    };
    // The host always goes by the participant count.
    host_conn.set_name(count.to_string());
    info!(name = %me, participants = count, "named by host");
    send(&host_conn, &SetupCommand::Inited)?;

    phase.send_replace(CoordinatorPhase::BuildingMesh);
    let mut peers = Vec::with_capacity(count.saturating_sub(1));
    let mut accepts: Vec<JoinHandle<Result<PeerConnection, LockstepError>>> = Vec::new();

    loop {
        match expect(&mut host_conn).await? {
            SetupCommand::OpenPort { name } => {
                let (listener, port) = open_peer_port(host_conn.local().ip()).await?;
                debug!(peer = %name, port, "listening for peer");
                accepts.push(tokio::spawn(accept_peer(listener, name, fault.clone())));
                send(&host_conn, &SetupCommand::PortOpen { port })?;
            }
            SetupCommand::Connect { name, host, port } => {
                let stream = TcpStream::connect((host.as_str(), port)).await?;
                let peer = PeerConnection::spawn(stream, name, fault.clone())?;
                let address = peer.remote().to_string();
                peers.push(peer);
                send(&host_conn, &SetupCommand::Connected { address })?;
            }
            SetupCommand::Begin => break,
            SetupCommand::Init { .. } => return Err(LockstepError::NameAlreadyAssigned),
            other => {
                warn!(got = %other, "reply token sent by host");
                return Err(LockstepError::UnexpectedMessage);
            }
        }
    }

    for accepted in join_all(accepts).await {
        let peer = accepted.map_err(|e| LockstepError::LogicError(format!("peer accept task failed: {e}")))??;
        peers.push(peer);
    }
    peers.push(host_conn);

    Ok(SetupOutcome { me, peers })
}

// Binds a fresh port on the interface the host reached us on.
async fn open_peer_port(ip: IpAddr) -> Result<(TcpListener, u16), LockstepError> {
    let listener = TcpListener::bind((ip, 0)).await.map_err(|e| {
        warn!(%ip, error = %e, "could not bind peer listener");
        LockstepError::UnableToOpenPort
    })?;
    let port = listener
        .local_addr()
        .map_err(|_| LockstepError::UnableToOpenPort)?
        .port();
    Ok((listener, port))
}

async fn accept_peer(listener: TcpListener, name: String, fault: Arc<Fault>) -> Result<PeerConnection, LockstepError> {
    let (stream, remote) = listener.accept().await?;
    debug!(peer = %name, %remote, "peer dialled in");
    PeerConnection::spawn(stream, name, fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test(flavor = "multi_thread")]
    async fn when_interface_is_local_then_a_fresh_port_is_opened() {
        let (listener, port) = open_peer_port(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .expect("loopback bind");
        assert_ne!(port, 0);
        assert_eq!(listener.local_addr().expect("addr").port(), port);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn when_interface_is_not_ours_then_port_cannot_be_opened() {
        // TEST-NET-1 is never assigned to a local interface.
        let result = open_peer_port(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))).await;
        assert!(matches!(result, Err(LockstepError::UnableToOpenPort)));
    }
}
