use axum::Router;
use std::net::SocketAddr;

/// Serves `app` on an ephemeral localhost port for the rest of the test.
pub async fn spawn_test_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
