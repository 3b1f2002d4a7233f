//! Fixed-membership group and the per-tick gather round.
//!
//! A wattmon run is one process per cluster node, started together by an
//! external launcher. Each process joins the group once at startup
//! ([`Group::join`]) and keeps its rank and the group size for the whole
//! run: rank 0 coordinates, every other rank is a worker holding one
//! point-to-point link to the coordinator. The round protocol itself lives
//! in [`round`].

mod link;
pub mod round;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use wattmon_wire::{Frame, FrameKind};

pub use wattmon_wire::Directive;

/// A process's position within the fixed communication group.
pub type Rank = u32;

/// Errors raised by membership and the round protocol.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("group: transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("group: {0}")]
    Wire(#[from] wattmon_wire::WireError),

    #[error("group: invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("group: no complete group within {timeout_secs}s (coordinator at {addr})")]
    JoinTimeout { addr: String, timeout_secs: u64 },

    #[error("group: join announced rank {rank}, outside this group of {size}")]
    RankOutOfRange { rank: Rank, size: u32 },

    #[error("group: duplicate join for rank {rank}")]
    DuplicateRank { rank: Rank },

    #[error("group: coordinator runs a group of {coordinator}, this node is configured for {configured}")]
    SizeMismatch { coordinator: u32, configured: u32 },

    #[error("group: expected a {expected} frame, received {received}")]
    UnexpectedFrame {
        expected: &'static str,
        received: &'static str,
    },

    #[error("group: record from rank {actual} arrived on the link for rank {expected}")]
    RankMismatch { expected: Rank, actual: Rank },

    #[error("group: operation is only valid on the {required}")]
    WrongRole { required: &'static str },
}

pub type Result<T> = std::result::Result<T, GroupError>;

/// Static description of the group, identical on every node apart from
/// `rank`. `members` lists one address per rank, in rank order; only
/// `members[0]`, the coordinator, is ever dialed.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub rank: Rank,
    pub members: Vec<SocketAddr>,
    pub join_timeout: Duration,
    pub recv_timeout: Duration,
}

#[derive(Debug)]
pub(crate) struct PeerLink {
    pub(crate) rank: Rank,
    pub(crate) stream: TcpStream,
    /// Cleared when the peer times out or drops; a dead rank is substituted
    /// with an unmeasured record without waiting.
    pub(crate) alive: bool,
}

#[derive(Debug)]
pub(crate) enum Role {
    /// Group of one: the coordinator's own record is the whole snapshot and
    /// no transport exists at all.
    Solo,
    /// Rank 0, holding one link per worker in increasing rank order.
    Coordinator { links: Vec<PeerLink> },
    /// Any other rank, holding its link to the coordinator.
    Worker { link: PeerLink },
}

/// Membership handle: rank and size are fixed from join to leave.
#[derive(Debug)]
pub struct Group {
    rank: Rank,
    size: u32,
    pub(crate) role: Role,
}

impl Group {
    /// Joins the fixed communication group.
    ///
    /// Fails fatally if the transport cannot initialize or the announced
    /// membership is inconsistent (wrong size, duplicate or out-of-range
    /// rank). There is no retry beyond the join window: the launcher is
    /// expected to start exactly `members.len()` cooperating processes
    /// together.
    pub async fn join(config: &GroupConfig) -> Result<Self> {
        if config.members.is_empty() {
            return Err(GroupError::InvalidConfig("empty member list".into()));
        }
        let size = config.members.len() as u32;
        if config.rank >= size {
            return Err(GroupError::InvalidConfig(format!(
                "rank {} outside the {}-member group",
                config.rank, size
            )));
        }

        if size == 1 {
            tracing::info!("single-node group, no transport to initialize");
            return Ok(Self {
                rank: 0,
                size: 1,
                role: Role::Solo,
            });
        }

        if config.rank == 0 {
            Self::join_coordinator(config, size).await
        } else {
            Self::join_worker(config, size).await
        }
    }

    async fn join_coordinator(config: &GroupConfig, size: u32) -> Result<Self> {
        let addr = config.members[0];
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, size, "coordinator waiting for the group to assemble");

        let slots = tokio::time::timeout(config.join_timeout, accept_members(&listener, size))
            .await
            .map_err(|_| GroupError::JoinTimeout {
                addr: addr.to_string(),
                timeout_secs: config.join_timeout.as_secs(),
            })??;

        // Slots were placed by rank index, so flattening preserves rank order.
        let mut links: Vec<PeerLink> = slots.into_iter().flatten().collect();
        for peer in &mut links {
            link::write_frame(&mut peer.stream, &Frame::join_ack(size)).await?;
        }
        tracing::info!(size, "group complete");

        Ok(Self {
            rank: 0,
            size,
            role: Role::Coordinator { links },
        })
    }

    async fn join_worker(config: &GroupConfig, size: u32) -> Result<Self> {
        let addr = config.members[0];
        let started = Instant::now();
        let mut stream = loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(e) if started.elapsed() < config.join_timeout => {
                    tracing::debug!(error = %e, "coordinator not accepting yet, retrying");
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => {
                    tracing::error!(%addr, error = %e, "could not reach the coordinator");
                    return Err(GroupError::JoinTimeout {
                        addr: addr.to_string(),
                        timeout_secs: config.join_timeout.as_secs(),
                    });
                }
            }
        };

        link::write_frame(&mut stream, &Frame::join(config.rank)).await?;
        let frame = tokio::time::timeout(config.join_timeout, link::read_frame(&mut stream))
            .await
            .map_err(|_| GroupError::JoinTimeout {
                addr: addr.to_string(),
                timeout_secs: config.join_timeout.as_secs(),
            })??;
        if frame.kind != FrameKind::JoinAck {
            return Err(GroupError::UnexpectedFrame {
                expected: "JoinAck",
                received: frame.kind.name(),
            });
        }
        let announced = frame.parse_join_ack()?;
        if announced != size {
            return Err(GroupError::SizeMismatch {
                coordinator: announced,
                configured: size,
            });
        }
        tracing::info!(rank = config.rank, size, "joined the group");

        Ok(Self {
            rank: config.rank,
            size,
            role: Role::Worker {
                link: PeerLink {
                    rank: 0,
                    stream,
                    alive: true,
                },
            },
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    /// Leaves the group, shutting every link down. Symmetric to
    /// [`Group::join`]; the scheduler broadcasts Stop before calling this,
    /// so no peer is left blocking.
    pub async fn leave(self) -> Result<()> {
        match self.role {
            Role::Solo => {}
            Role::Coordinator { links } => {
                for mut peer in links {
                    let _ = peer.stream.shutdown().await;
                }
            }
            Role::Worker { mut link } => {
                let _ = link.stream.shutdown().await;
            }
        }
        tracing::info!("left the group");
        Ok(())
    }
}

/// Accepts Join frames until every worker rank is present, validating rank
/// range and uniqueness as they arrive.
async fn accept_members(listener: &TcpListener, size: u32) -> Result<Vec<Option<PeerLink>>> {
    let mut slots: Vec<Option<PeerLink>> = (1..size).map(|_| None).collect();
    let mut joined = 0u32;
    while joined < size - 1 {
        let (mut stream, peer) = listener.accept().await?;
        let frame = link::read_frame(&mut stream).await?;
        if frame.kind != FrameKind::Join {
            return Err(GroupError::UnexpectedFrame {
                expected: "Join",
                received: frame.kind.name(),
            });
        }
        let rank = frame.rank;
        if rank == 0 || rank >= size {
            return Err(GroupError::RankOutOfRange { rank, size });
        }
        let slot = &mut slots[(rank - 1) as usize];
        if slot.is_some() {
            return Err(GroupError::DuplicateRank { rank });
        }
        *slot = Some(PeerLink {
            rank,
            stream,
            alive: true,
        });
        joined += 1;
        tracing::info!(rank, %peer, "worker joined");
    }
    Ok(slots)
}

