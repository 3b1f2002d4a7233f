//! End-to-end rounds over localhost: membership, rank ordering, sentinel
//! substitution and shutdown propagation.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use wattmon_common::record::{NodeRecord, UNMEASURED_COUNT};
use wattmon_group::{Directive, Group, GroupConfig, GroupError};
use wattmon_wire::{Frame, RecordSchema};

/// Reserves a localhost port by binding and immediately releasing it.
fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr")
}

fn config(rank: u32, members: &[SocketAddr]) -> GroupConfig {
    GroupConfig {
        rank,
        members: members.to_vec(),
        join_timeout: Duration::from_secs(5),
        recv_timeout: Duration::from_secs(5),
    }
}

/// A record tagged with its sender so ordering is observable.
fn marked_record(rank: u32) -> NodeRecord {
    let mut record = NodeRecord::unmeasured();
    record.system.processes_all = 100 + rank as i64;
    record
}

/// Worker loop: obey directives until Stop, sending a tagged record each
/// round.
async fn run_worker(rank: u32, members: Vec<SocketAddr>) {
    let mut group = Group::join(&config(rank, &members)).await.expect("join");
    let schema = RecordSchema::build().expect("schema");
    loop {
        let (_, directive) = group.await_directive().await.expect("directive");
        if directive == Directive::Stop {
            break;
        }
        group
            .send_record(&marked_record(rank), &schema)
            .await
            .expect("send");
    }
    group.leave().await.expect("leave");
}

#[tokio::test]
async fn solo_group_gathers_without_any_transport() {
    let members = vec![free_addr()];
    let mut group = Group::join(&config(0, &members)).await.unwrap();
    assert_eq!(group.rank(), 0);
    assert_eq!(group.size(), 1);
    assert!(group.is_coordinator());

    let schema = RecordSchema::build().unwrap();
    let snapshot = group
        .gather(marked_record(0), Utc::now(), &schema, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.records[0].system.processes_all, 100);
    group.leave().await.unwrap();
}

#[tokio::test]
async fn three_rank_gather_orders_records_by_sender_rank() {
    let members = vec![free_addr(), free_addr(), free_addr()];
    let w1 = tokio::spawn(run_worker(1, members.clone()));
    let w2 = tokio::spawn(run_worker(2, members.clone()));

    let mut group = Group::join(&config(0, &members)).await.unwrap();
    let schema = RecordSchema::build().unwrap();

    for round in 0..3u64 {
        group.begin_round(round, Directive::Continue).await.unwrap();
        let snapshot = group
            .gather(marked_record(0), Utc::now(), &schema, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 3);
        for rank in 0..3u32 {
            assert_eq!(
                snapshot.records[rank as usize].system.processes_all,
                100 + rank as i64,
                "round {round}: entry {rank} must come from rank {rank}"
            );
        }
    }

    group.begin_round(3, Directive::Stop).await.unwrap();
    w1.await.unwrap();
    w2.await.unwrap();
    group.leave().await.unwrap();
}

#[tokio::test]
async fn all_sentinel_worker_still_yields_a_full_snapshot() {
    let members = vec![free_addr(), free_addr(), free_addr()];

    // Rank 1 reports a completely unmeasured record every round.
    let blank_members = members.clone();
    let w1 = tokio::spawn(async move {
        let mut group = Group::join(&config(1, &blank_members)).await.expect("join");
        let schema = RecordSchema::build().expect("schema");
        loop {
            let (_, directive) = group.await_directive().await.expect("directive");
            if directive == Directive::Stop {
                break;
            }
            group
                .send_record(&NodeRecord::unmeasured(), &schema)
                .await
                .expect("send");
        }
        group.leave().await.expect("leave");
    });
    let w2 = tokio::spawn(run_worker(2, members.clone()));

    let mut group = Group::join(&config(0, &members)).await.unwrap();
    let schema = RecordSchema::build().unwrap();
    group.begin_round(0, Directive::Continue).await.unwrap();
    let snapshot = group
        .gather(marked_record(0), Utc::now(), &schema, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.records[1], NodeRecord::unmeasured());
    assert_eq!(snapshot.records[0].system.processes_all, 100);
    assert_eq!(snapshot.records[2].system.processes_all, 102);

    group.begin_round(1, Directive::Stop).await.unwrap();
    w1.await.unwrap();
    w2.await.unwrap();
    group.leave().await.unwrap();
}

#[tokio::test]
async fn straggler_is_substituted_and_stays_dead() {
    let members = vec![free_addr(), free_addr(), free_addr()];

    let w1 = tokio::spawn(run_worker(1, members.clone()));
    // Rank 2 joins, then never sends a record.
    let silent_members = members.clone();
    let w2 = tokio::spawn(async move {
        let mut group = Group::join(&config(2, &silent_members)).await.expect("join");
        let _ = group.await_directive().await;
        std::future::pending::<()>().await;
    });

    let mut group = Group::join(&config(0, &members)).await.unwrap();
    let schema = RecordSchema::build().unwrap();

    for round in 0..2u64 {
        group.begin_round(round, Directive::Continue).await.unwrap();
        let snapshot = group
            .gather(
                marked_record(0),
                Utc::now(),
                &schema,
                Duration::from_millis(300),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.records[1].system.processes_all, 101);
        assert_eq!(
            snapshot.records[2].system.processes_all,
            UNMEASURED_COUNT,
            "round {round}: silent rank must be substituted"
        );
    }

    group.begin_round(2, Directive::Stop).await.unwrap();
    w1.await.unwrap();
    w2.abort();
    group.leave().await.unwrap();
}

#[tokio::test]
async fn duplicate_rank_is_fatal_at_join() {
    let members = vec![free_addr(), free_addr(), free_addr()];
    let addr = members[0];

    let coordinator = tokio::spawn({
        let members = members.clone();
        async move { Group::join(&config(0, &members)).await }
    });

    // Two claimants of rank 1; keep both streams open so the coordinator
    // sees the second Join rather than a dropped connection.
    let mut claimants = Vec::new();
    for _ in 0..2 {
        let mut stream = loop {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        };
        let bytes = Frame::join(1).to_bytes().unwrap();
        stream.write_all(&bytes).await.unwrap();
        claimants.push(stream);
    }

    let err = coordinator.await.unwrap().unwrap_err();
    assert!(matches!(err, GroupError::DuplicateRank { rank: 1 }));
}

#[tokio::test]
async fn worker_rejects_a_size_disagreement() {
    let members_for_worker = vec![free_addr(), free_addr()];
    let addr = members_for_worker[0];

    // A "coordinator" that acknowledges with the wrong group size.
    let fake = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();
        // Consume the Join frame.
        use tokio::io::AsyncReadExt;
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).await.unwrap();
        let mut rest = vec![0u8; u32::from_be_bytes(len) as usize];
        stream.read_exact(&mut rest).await.unwrap();
        let ack = Frame::join_ack(5).to_bytes().unwrap();
        stream.write_all(&ack).await.unwrap();
        stream
    });

    let err = Group::join(&config(1, &members_for_worker))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GroupError::SizeMismatch {
            coordinator: 5,
            configured: 2
        }
    ));
    drop(fake);
}
