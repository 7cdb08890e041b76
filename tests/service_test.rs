mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{corpus, memory_cache, FakeEmbeddingProvider, BASH_MD, CURL_MD};
use lia::embedding::EmbeddingCache;
use lia::error::LiaError;
use lia::history::QueryHistory;
use lia::search::QueryPipeline;
use lia::service::protocol::{write_frame, Request};
use lia::service::{ResidentService, ServiceClient, ServiceContext};
use tempfile::TempDir;
use tokio::task::JoinHandle;

struct Running {
    _data: TempDir,
    run_dir: TempDir,
    client: ServiceClient,
    handle: JoinHandle<lia::error::Result<()>>,
}

fn start() -> Running {
    start_with(FakeEmbeddingProvider::new())
}

fn start_with(provider: FakeEmbeddingProvider) -> Running {
    let (data, store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let run_dir = TempDir::new().unwrap();
    let provider = Arc::new(provider);
    let context = ServiceContext::new(
        provider.clone(),
        EmbeddingCache::new("fake-bow"),
        store,
        QueryHistory::new(run_dir.path().join("history")),
    );

    let socket = run_dir.path().join("lia.sock");
    let service = ResidentService::bind(&socket, context).unwrap();
    let handle = tokio::spawn(service.run());
    let client = ServiceClient::new(&socket, run_dir.path().join("daemon.log")).without_autostart();

    Running {
        _data: data,
        run_dir,
        client,
        handle,
    }
}

#[tokio::test]
async fn search_over_socket_matches_in_process_ranking() {
    let running = start();
    let remote = running
        .client
        .search("extract lines from file bash", None)
        .await
        .unwrap();

    let (_dir, mut store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);
    let local = QueryPipeline::new(&mut store, &cache, &provider)
        .search("extract lines from file bash", None)
        .unwrap();

    assert_eq!(remote, local);
    assert_eq!(
        remote[0].record.heading,
        "How to extract a range of lines from a file in bash?"
    );

    assert!(running.client.stop().await.unwrap());
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_removes_the_socket() {
    let running = start();
    let socket = running.client.socket_path().to_path_buf();
    running.client.ping().await.unwrap();
    assert!(socket.exists());

    assert!(running.client.stop().await.unwrap());
    running.handle.await.unwrap().unwrap();
    assert!(!socket.exists());
    assert!(!running.client.stop().await.unwrap(), "already stopped");
}

#[tokio::test]
async fn searches_are_recorded_in_history() {
    let running = start();
    running.client.search("curl follow redirects", None).await.unwrap();
    running.client.search("bash loop files", None).await.unwrap();

    let history = running.client.history(10).await.unwrap();
    assert_eq!(history, vec!["bash loop files", "curl follow redirects"]);
    assert!(running.run_dir.path().join("history").exists());

    running.client.stop().await.unwrap();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_topic_filter_is_reported_to_client() {
    let running = start();
    let err = running
        .client
        .search("anything", Some("python"))
        .await
        .unwrap_err();
    assert!(matches!(&err, LiaError::Service(msg) if msg.contains("python")));

    running.client.stop().await.unwrap();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_vanishing_mid_request_leaves_service_usable() {
    let running = start();
    {
        let mut stream = tokio::net::UnixStream::connect(running.client.socket_path())
            .await
            .unwrap();
        write_frame(&mut stream, &Request::search("bash loop files", None))
            .await
            .unwrap();
    }

    let hits = running
        .client
        .search("curl post json", None)
        .await
        .unwrap();
    assert_eq!(hits[0].record.heading, "How to send a POST request with JSON?");

    running.client.stop().await.unwrap();
    running.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_lets_in_flight_query_finish() {
    let running = start_with(FakeEmbeddingProvider::new().with_delay(Duration::from_millis(40)));
    let socket = running.client.socket_path().to_path_buf();
    let log = running.run_dir.path().join("daemon.log");

    let searcher = ServiceClient::new(&socket, &log).without_autostart();
    let search = tokio::spawn(async move {
        searcher.search("extract lines from file bash", None).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(running.client.stop().await.unwrap());
    let hits = search.await.unwrap().unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(
        hits[0].record.heading,
        "How to extract a range of lines from a file in bash?"
    );

    running.handle.await.unwrap().unwrap();
    assert!(!socket.exists());
}
