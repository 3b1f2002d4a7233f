//! One execution of the gather protocol, corresponding to one polling tick.
//!
//! A round has two phases. The coordinator first broadcasts a
//! [`Directive`] to every live worker in increasing rank order: Continue
//! opens the data phase, Stop ends the run for everyone, which is what keeps
//! workers from blocking forever on a send after the coordinator decides to
//! quit. In the data phase each worker sends exactly one record and the
//! coordinator receives one per rank, strictly sequentially and in
//! increasing rank order, with its own record at index 0 and no network hop.
//!
//! Peer failure is survivable: a rank that times out or drops its link is
//! logged and its slot filled with the all-sentinel record, and it is
//! substituted without waiting in later rounds. A malformed frame is not:
//! the group is trusted and co-scheduled, so a protocol violation aborts
//! the process.

use std::time::Duration;

use chrono::{DateTime, Utc};
use wattmon_common::record::NodeRecord;
use wattmon_common::snapshot::ClusterSnapshot;
use wattmon_wire::{Directive, Frame, FrameKind, RecordSchema};

use crate::{link, Group, GroupError, Result, Role};

impl Group {
    /// Control phase: broadcast `directive` for `round` to every live
    /// worker, in increasing rank order. Coordinator only; a solo group has
    /// nobody to notify.
    pub async fn begin_round(&mut self, round: u64, directive: Directive) -> Result<()> {
        let links = match &mut self.role {
            Role::Solo => return Ok(()),
            Role::Coordinator { links } => links,
            Role::Worker { .. } => {
                return Err(GroupError::WrongRole {
                    required: "coordinator",
                })
            }
        };
        let frame = Frame::control(round, directive);
        for peer in links.iter_mut().filter(|p| p.alive) {
            if let Err(e) = link::write_frame(&mut peer.stream, &frame).await {
                tracing::warn!(rank = peer.rank, error = %e, "control send failed, marking rank dead");
                peer.alive = false;
            }
        }
        Ok(())
    }

    /// Data phase on the coordinator: assemble the round's snapshot.
    ///
    /// Entry `i` of the result was sent by rank `i`; the coordinator's own
    /// record sits at index 0. The snapshot always has exactly group-size
    /// entries; an unresponsive rank is replaced by
    /// [`NodeRecord::unmeasured`] after `recv_timeout`.
    pub async fn gather(
        &mut self,
        own: NodeRecord,
        timestamp: DateTime<Utc>,
        schema: &RecordSchema,
        recv_timeout: Duration,
    ) -> Result<ClusterSnapshot> {
        let size = self.size as usize;
        let links = match &mut self.role {
            Role::Solo => {
                return Ok(ClusterSnapshot {
                    timestamp,
                    records: vec![own],
                })
            }
            Role::Coordinator { links } => links,
            Role::Worker { .. } => {
                return Err(GroupError::WrongRole {
                    required: "coordinator",
                })
            }
        };

        let mut records = Vec::with_capacity(size);
        records.push(own);

        for peer in links.iter_mut() {
            if !peer.alive {
                records.push(NodeRecord::unmeasured());
                continue;
            }
            match tokio::time::timeout(recv_timeout, link::read_frame(&mut peer.stream)).await {
                Err(_) => {
                    tracing::warn!(
                        rank = peer.rank,
                        timeout_ms = recv_timeout.as_millis() as u64,
                        "no record within the receive window, substituting unmeasured"
                    );
                    peer.alive = false;
                    records.push(NodeRecord::unmeasured());
                }
                Ok(Err(GroupError::Io(e))) => {
                    tracing::warn!(rank = peer.rank, error = %e, "rank lost mid-round, substituting unmeasured");
                    peer.alive = false;
                    records.push(NodeRecord::unmeasured());
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok(frame)) => {
                    if frame.kind != FrameKind::Record {
                        return Err(GroupError::UnexpectedFrame {
                            expected: "Record",
                            received: frame.kind.name(),
                        });
                    }
                    if frame.rank != peer.rank {
                        return Err(GroupError::RankMismatch {
                            expected: peer.rank,
                            actual: frame.rank,
                        });
                    }
                    records.push(schema.decode(&frame.body)?);
                }
            }
        }

        debug_assert_eq!(records.len(), size);
        Ok(ClusterSnapshot { timestamp, records })
    }

    /// Worker side of the control phase: block until the coordinator opens
    /// the next round or ends the run. No timeout; the coordinator always
    /// broadcasts Stop before leaving.
    pub async fn await_directive(&mut self) -> Result<(u64, Directive)> {
        let peer = match &mut self.role {
            Role::Worker { link } => link,
            _ => {
                return Err(GroupError::WrongRole {
                    required: "a worker",
                })
            }
        };
        let frame = link::read_frame(&mut peer.stream).await?;
        if frame.kind != FrameKind::Control {
            return Err(GroupError::UnexpectedFrame {
                expected: "Control",
                received: frame.kind.name(),
            });
        }
        Ok(frame.parse_control()?)
    }

    /// Worker side of the data phase: exactly one record send per tick.
    pub async fn send_record(&mut self, record: &NodeRecord, schema: &RecordSchema) -> Result<()> {
        let rank = self.rank();
        let peer = match &mut self.role {
            Role::Worker { link } => link,
            _ => {
                return Err(GroupError::WrongRole {
                    required: "a worker",
                })
            }
        };
        let payload = schema.encode(record)?;
        link::write_frame(&mut peer.stream, &Frame::record(rank, payload)).await
    }
}
