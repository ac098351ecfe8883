//! Bootstrap loader against a local HTTP server.
#![cfg(feature = "http")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use streamtrack::loader::{BootstrapLoader, HttpScriptSource};
use streamtrack::{Error, TrackerConfig};
use tiny_http::{Response, Server};

const SCRIPT: &str = "window.onYouTubeIframeAPIReady && window.onYouTubeIframeAPIReady();";

/// Serve `/iframe_api` (and 404 anything else), counting requests.
fn start_server() -> (String, Arc<AtomicUsize>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            counter.fetch_add(1, Ordering::SeqCst);
            let response = match request.url() {
                "/iframe_api" => Response::from_string(SCRIPT).with_header(
                    "Content-Type: text/javascript"
                        .parse::<tiny_http::Header>()
                        .unwrap(),
                ),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    (format!("http://{}", addr), hits)
}

#[tokio::test]
async fn test_load_is_fetched_once() {
    let (base, hits) = start_server();
    let config = TrackerConfig {
        bootstrap_url: format!("{}/iframe_api", base),
        bootstrap_timeout_ms: 5000,
        ..Default::default()
    };
    let loader = BootstrapLoader::from_config(&config).unwrap();

    let (a, b) = tokio::join!(loader.load(), loader.load());
    let a = a.unwrap();
    assert_eq!(a.source, SCRIPT);
    assert_eq!(a, b.unwrap());
    assert!(loader.is_loaded());

    loader.load().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    loader.reset();
    assert!(!loader.is_loaded());
    loader.load().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_status_is_a_bootstrap_error() {
    let (base, _hits) = start_server();
    let source = HttpScriptSource::new(format!("{}/missing.js", base), 5000).unwrap();
    let loader = BootstrapLoader::new(Arc::new(source));
    let err = loader.load().await.unwrap_err();
    match err {
        Error::BootstrapError(msg) => assert!(msg.contains("404"), "unexpected message: {}", msg),
        other => panic!("expected BootstrapError, got {:?}", other),
    }
}
