//! One-shot HTTP responder for client tests.

use tokio::{
    io::{self, AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

/// Request line received by the stub, or the I/O error that ended the exchange.
pub(crate) type RequestLine = oneshot::Receiver<Result<String, String>>;

/// Serves one canned JSON response on a loopback port and reports the request line.
pub(crate) async fn serve_once(status: &'static str, body: &'static str) -> (String, RequestLine) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = respond(listener, status, body).await;
        let _ = tx.send(outcome.map_err(|e| e.to_string()));
    });

    (format!("http://{addr}"), rx)
}

async fn respond(listener: TcpListener, status: &str, body: &str) -> io::Result<String> {
    let (mut socket, _) = listener.accept().await?;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request_line = String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(request_line)
}

pub(crate) fn local_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build loopback http client")
}
