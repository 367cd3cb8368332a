//! End-to-end tests through the public API the binary uses.


use std::sync::Arc;
use std::time::Duration;

use test_harness::{test_coordinator_config, test_worker_config};
use udp_fold::config::{parse_coordinator_addr, DEFAULT_COORDINATOR_PORT};
use udp_fold::coordinator::Coordinator;
use udp_fold::dataset::SAMPLE_RANGE;
use udp_fold::hooks::LogHooks;
use udp_fold::worker::WorkerRuntime;

/// Coordinator and workers wired with the tracing hooks, running a
/// generated job the way `udp-fold coordinator` does.
#[tokio::test]
async fn test_generated_job_end_to_end() {
    let coordinator = Coordinator::bind(test_coordinator_config(2), Arc::new(LogHooks))
        .await
        .unwrap();
    let tasks = coordinator.start();
    let coordinator_addr = coordinator.local_addr().unwrap();

    let mut workers = Vec::new();
    for _ in 0..2 {
        let worker = Arc::new(
            WorkerRuntime::bind(test_worker_config(coordinator_addr), Arc::new(LogHooks))
                .await
                .unwrap(),
        );
        let runner = worker.clone();
        tokio::spawn(async move {
            let _ = runner.run().await;
        });
        workers.push(worker);
    }

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        coordinator.run_generated_job(25_000),
    )
    .await
    .expect("job timed out")
    .expect("job failed");

    let agg = &report.aggregate;
    assert_eq!(report.dataset_size, 25_000);
    assert_eq!(agg.total_count, 25_000);
    assert!(SAMPLE_RANGE.contains(&agg.min));
    assert!(SAMPLE_RANGE.contains(&agg.max));
    assert!(agg.min <= agg.max);
    assert!(agg.average >= *SAMPLE_RANGE.start() as f64);
    assert!(agg.average <= *SAMPLE_RANGE.end() as f64);
    assert!(agg.elapsed_secs >= 0.0);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["dataset_size"], 25_000);
    assert_eq!(json["aggregate"]["total_count"], 25_000);
    assert!(json["job_id"].is_string());

    for worker in &workers {
        worker.stop();
    }
    coordinator.shutdown();
    for task in tasks {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("background task did not stop")
            .unwrap();
    }
}

/// A second coordinator on a port already in use fails to bind.
#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let first = Coordinator::bind(test_coordinator_config(1), Arc::new(LogHooks))
        .await
        .unwrap();
    let taken = first.local_addr().unwrap();

    let config = udp_fold::config::CoordinatorConfig {
        listen_addr: taken,
        ..test_coordinator_config(1)
    };
    let err = Coordinator::bind(config, Arc::new(LogHooks))
        .await
        .err()
        .expect("second bind should fail");
    assert!(matches!(err, udp_fold::error::FoldError::Bind { addr, .. } if addr == taken));
}

#[test]
fn test_coordinator_address_parsing() {
    let bare = parse_coordinator_addr("127.0.0.1").unwrap();
    assert_eq!(bare.port(), DEFAULT_COORDINATOR_PORT);

    let explicit = parse_coordinator_addr("127.0.0.1:4242").unwrap();
    assert_eq!(explicit.port(), 4242);

    assert!(parse_coordinator_addr("").is_err());
}
