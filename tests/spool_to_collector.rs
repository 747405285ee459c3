#![cfg(feature = "http")]

mod common;

use std::time::Duration;

use common::{file_names, spawn_collector};
use file_log_publisher::config::PublisherConfig;
use file_log_publisher::publisher::Publisher;
use file_log_publisher::spool::{SpoolConfig, Spooler};
use serde::Serialize;

#[derive(Serialize)]
struct AccessLog<'a> {
    request_id: &'a str,
    response_code: u16,
}

#[tokio::test]
async fn spooled_records_reach_the_collector_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (base, mut requests) = spawn_collector(200).await;

    let (spooler, writer) = Spooler::new(
        dir.path(),
        SpoolConfig {
            batch_size: 2,
            ..SpoolConfig::default()
        },
    );
    for (id, code) in [("req-1", 200), ("req-2", 404), ("req-3", 500)] {
        spooler
            .push_json(&AccessLog {
                request_id: id,
                response_code: code,
            })
            .unwrap();
    }
    drop(spooler);
    writer.await.unwrap();
    assert_eq!(file_names(dir.path()).len(), 2);

    let handle = Publisher::from_config(PublisherConfig {
        directory: dir.path().to_path_buf(),
        endpoint: format!("{}/events", base),
        flush_interval: Duration::from_millis(50),
        ..PublisherConfig::default()
    })
    .unwrap()
    .start();

    let req = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    handle.shutdown(None).await.unwrap();

    assert_eq!(
        req.body_text(),
        "{\"request_id\":\"req-1\",\"response_code\":200}\n\
         {\"request_id\":\"req-2\",\"response_code\":404}\n\
         {\"request_id\":\"req-3\",\"response_code\":500}\n"
    );
    assert!(file_names(dir.path()).is_empty());
}
