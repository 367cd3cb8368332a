//! Worker-side tests: chunk execution, registration and the TASK loop,
//! driven against a hand-rolled coordinator socket.


use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use test_harness::{loopback, test_worker_config, RecordingWorkerHooks};
use udp_fold::error::FoldError;
use udp_fold::hooks::WorkerStatus;
use udp_fold::protocol::{ChunkId, Message, Operation, PartialResult, Received, Transport};
use udp_fold::worker::{TaskExecutor, WorkerRuntime};

#[test]
fn test_executor_computes_stats() {
    let executor = TaskExecutor::new();
    let out = executor.execute(7, Operation::SumAndStats, &[4, -2, 9, 0]);

    assert_eq!(out.chunk_id, 7);
    assert_eq!(
        out.result,
        PartialResult {
            sum: 11,
            count: 4,
            min: -2,
            max: 9
        }
    );
}

#[test]
fn test_executor_empty_chunk_is_zeros() {
    let out = TaskExecutor::new().execute(0, Operation::SumAndStats, &[]);
    assert_eq!(out.result, PartialResult::default());
}

/// Collects the next message of interest, skipping heartbeats.
async fn next_non_heartbeat(coordinator: &Transport, within: Duration) -> Option<(Message, SocketAddr)> {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        match coordinator.recv().await.unwrap() {
            Received::Message {
                message: Message::Heartbeat,
                ..
            } => continue,
            Received::Message { message, from } => return Some((message, from)),
            _ => continue,
        }
    }
    None
}

/// Late REGISTER retries are skipped too.
async fn next_result(coordinator: &Transport) -> (ChunkId, PartialResult) {
    loop {
        match next_non_heartbeat(coordinator, Duration::from_secs(2)).await {
            Some((Message::Result { chunk_id, result }, _)) => return (chunk_id, result),
            Some((Message::Register, _)) => continue,
            other => panic!("expected RESULT, got {:?}", other),
        }
    }
}

/// Binds a fake coordinator, starts a worker against it and completes the
/// registration handshake.
async fn registered_worker() -> (
    Transport,
    Arc<WorkerRuntime>,
    Arc<RecordingWorkerHooks>,
    SocketAddr,
) {
    let coordinator = Transport::bind(loopback(), Duration::from_millis(50))
        .await
        .unwrap();
    let hooks = Arc::new(RecordingWorkerHooks::default());
    let worker = Arc::new(
        WorkerRuntime::bind(
            test_worker_config(coordinator.local_addr().unwrap()),
            hooks.clone(),
        )
        .await
        .unwrap(),
    );

    let runner = worker.clone();
    tokio::spawn(async move {
        let _ = runner.run().await;
    });

    let worker_addr = match next_non_heartbeat(&coordinator, Duration::from_secs(2)).await {
        Some((Message::Register, from)) => from,
        other => panic!("expected REGISTER, got {:?}", other),
    };
    coordinator
        .send(&Message::ack("registered"), worker_addr)
        .await
        .unwrap();

    (coordinator, worker, hooks, worker_addr)
}

#[tokio::test]
async fn test_worker_answers_task_with_result() {
    let (coordinator, worker, hooks, worker_addr) = registered_worker().await;

    coordinator
        .send(&Message::task(3, vec![10, 20, 30]), worker_addr)
        .await
        .unwrap();

    let (chunk_id, result) = next_result(&coordinator).await;
    assert_eq!(chunk_id, 3);
    assert_eq!(result, PartialResult::from_values(&[10, 20, 30]));
    assert_eq!(hooks.tasks.lock().unwrap().as_slice(), &[(3, 3)]);

    worker.stop();
}

/// The worker keeps no memory of processed chunks: the same TASK twice gets
/// two identical RESULTs.
#[tokio::test]
async fn test_worker_processes_duplicate_task_twice() {
    let (coordinator, worker, hooks, worker_addr) = registered_worker().await;

    let task = Message::task(11, vec![5, 6]);
    coordinator.send(&task, worker_addr).await.unwrap();
    coordinator.send(&task, worker_addr).await.unwrap();

    let first = next_result(&coordinator).await;
    let second = next_result(&coordinator).await;
    assert_eq!(first, second);
    assert_eq!(first.0, 11);
    assert_eq!(hooks.tasks.lock().unwrap().len(), 2);

    worker.stop();
}

#[tokio::test]
async fn test_worker_answers_empty_task_with_zeros() {
    let (coordinator, worker, _hooks, worker_addr) = registered_worker().await;

    coordinator
        .send(&Message::task(0, Vec::new()), worker_addr)
        .await
        .unwrap();

    let (chunk_id, result) = next_result(&coordinator).await;
    assert_eq!(chunk_id, 0);
    assert_eq!(result, PartialResult::default());

    worker.stop();
}

/// Stray ACKs and garbage after registration do not stop the TASK loop.
#[tokio::test]
async fn test_worker_survives_noise() {
    let (coordinator, worker, _hooks, worker_addr) = registered_worker().await;

    coordinator
        .send(&Message::ack("again"), worker_addr)
        .await
        .unwrap();
    coordinator
        .send_bytes(b"{\"broken\":", worker_addr)
        .await
        .unwrap();
    coordinator
        .send(&Message::Heartbeat, worker_addr)
        .await
        .unwrap();
    coordinator
        .send(&Message::task(4, vec![1]), worker_addr)
        .await
        .unwrap();

    let (chunk_id, result) = next_result(&coordinator).await;
    assert_eq!(chunk_id, 4);
    assert_eq!(result.sum, 1);

    worker.stop();
}

/// A registered worker heartbeats to the coordinator address it was given.
#[tokio::test]
async fn test_worker_sends_heartbeats() {
    let (coordinator, worker, hooks, worker_addr) = registered_worker().await;

    let mut heartbeats = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while heartbeats < 2 && tokio::time::Instant::now() < deadline {
        if let Received::Message {
            message: Message::Heartbeat,
            from,
        } = coordinator.recv().await.unwrap()
        {
            assert_eq!(from, worker_addr);
            heartbeats += 1;
        }
    }
    assert_eq!(heartbeats, 2);
    assert_eq!(
        hooks.statuses.lock().unwrap().as_slice(),
        &[WorkerStatus::Unregistered, WorkerStatus::Registered]
    );

    worker.stop();
}

/// No ACK within the configured attempts: the worker gives up, reports
/// DISCONNECTED and never enters its main loop.
#[tokio::test]
async fn test_registration_failure() {
    let silent = Transport::bind(loopback(), Duration::from_millis(50))
        .await
        .unwrap();
    let config = udp_fold::config::WorkerConfig {
        registration_attempts: 2,
        registration_timeout_ms: 50,
        registration_retry_delay_ms: 10,
        ..test_worker_config(silent.local_addr().unwrap())
    };
    let hooks = Arc::new(RecordingWorkerHooks::default());
    let worker = WorkerRuntime::bind(config, hooks.clone()).await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(2), worker.run())
        .await
        .expect("registration did not give up")
        .unwrap_err();
    assert!(matches!(err, FoldError::RegistrationFailed { attempts: 2 }));

    assert_eq!(
        hooks.statuses.lock().unwrap().as_slice(),
        &[WorkerStatus::Unregistered, WorkerStatus::Disconnected]
    );
    assert!(hooks.tasks.lock().unwrap().is_empty());

    let mut registers = 0;
    while let Received::Message {
        message: Message::Register,
        ..
    } = silent.recv().await.unwrap()
    {
        registers += 1;
    }
    assert_eq!(registers, 2);
}

/// Stopping a registered worker ends its loop within a receive timeout and
/// reports DISCONNECTED.
#[tokio::test]
async fn test_stop_disconnects_worker() {
    let (_coordinator, worker, hooks, _worker_addr) = registered_worker().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    worker.stop();

    let hooks_ref = hooks.clone();
    test_harness::assert_eventually(
        || {
            let hooks = hooks_ref.clone();
            async move {
                hooks.statuses.lock().unwrap().last() == Some(&WorkerStatus::Disconnected)
            }
        },
        Duration::from_secs(2),
        "worker should report disconnected after stop",
    )
    .await;
}
