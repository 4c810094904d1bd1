//! Loopback caster used by the tests.

use crate::config::EndpointConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(2);

/// Accepts uploads on 127.0.0.1, answers the handshake, and records what arrives.
pub(crate) struct MockCaster {
    addr: SocketAddr,
    requests: Mutex<mpsc::UnboundedReceiver<String>>,
    data: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    pending: Mutex<Vec<u8>>,
    hangup: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MockCaster {
    /// Replies with `response` to every handshake.
    pub(crate) async fn start(response: &[u8]) -> Self {
        Self::spawn(Some(response.to_vec()), true).await
    }

    /// Reads the handshake and never answers.
    pub(crate) async fn silent() -> Self {
        Self::spawn(None, true).await
    }

    /// Accepts the upload, then stops reading so the socket buffers fill.
    pub(crate) async fn stalled() -> Self {
        Self::spawn(Some(b"ICY 200 OK\r\n".to_vec()), false).await
    }

    async fn spawn(response: Option<Vec<u8>>, read_uploads: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let hangup = Arc::new(Notify::new());

        let task = tokio::spawn(serve(
            listener,
            response,
            read_uploads,
            req_tx,
            data_tx,
            hangup.clone(),
        ));

        Self {
            addr,
            requests: Mutex::new(req_rx),
            data: Mutex::new(data_rx),
            pending: Mutex::new(Vec::new()),
            hangup,
            task,
        }
    }

    pub(crate) fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::new("127.0.0.1", self.addr.port(), "TEST").with_client_name("test")
    }

    /// Next handshake request received.
    pub(crate) async fn request(&self) -> String {
        let mut rx = self.requests.lock().await;
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("no request within deadline")
            .expect("caster stopped")
    }

    /// Exactly `n` upload bytes, waiting for them to arrive.
    pub(crate) async fn received(&self, n: usize) -> Vec<u8> {
        let mut pending = self.pending.lock().await;
        let mut rx = self.data.lock().await;
        while pending.len() < n {
            let chunk = tokio::time::timeout(WAIT, rx.recv())
                .await
                .expect("no data within deadline")
                .expect("caster stopped");
            pending.extend_from_slice(&chunk);
        }
        let rest = pending.split_off(n);
        std::mem::replace(&mut *pending, rest)
    }

    /// Drops the current connection from the caster side.
    pub(crate) async fn hang_up(&self) {
        self.hangup.notify_one();
        tokio::task::yield_now().await;
    }
}

impl Drop for MockCaster {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    listener: TcpListener,
    response: Option<Vec<u8>>,
    read_uploads: bool,
    requests: mpsc::UnboundedSender<String>,
    data: mpsc::UnboundedSender<Vec<u8>>,
    hangup: Arc<Notify>,
) {
    let mut buf = [0u8; 2048];
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };

        let mut head = Vec::new();
        let mut body = Vec::new();
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            head.extend_from_slice(&buf[..n]);
            if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
                body = head.split_off(pos + 4);
                break;
            }
        }
        let _ = requests.send(String::from_utf8_lossy(&head).into_owned());
        if !body.is_empty() {
            let _ = data.send(body);
        }

        if let Some(response) = &response {
            let _ = stream.write_all(response).await;
        }

        if !read_uploads {
            hangup.notified().await;
            continue;
        }

        loop {
            tokio::select! {
                _ = hangup.notified() => break,
                read = stream.read(&mut buf) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let _ = data.send(buf[..n].to_vec());
                    }
                },
            }
        }
    }
}

/// A local port with nothing listening on it.
pub(crate) async fn unreachable_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
