//! Shared helpers for the wiremock-based integration tests.

use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a mock upstream server, or returns `None` when the environment
/// forbids binding localhost sockets, in which case the caller skips the
/// test. Set `EXAM_REQUIRE_SOCKET_TESTS=1` to fail instead of skipping.
pub async fn mock_server() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }

    let message = "cannot bind a localhost socket; skipping wiremock-based test";
    if std::env::var("EXAM_REQUIRE_SOCKET_TESTS").is_ok_and(|v| v == "1") {
        panic!("{message}");
    }
    eprintln!("{message}");
    None
}
