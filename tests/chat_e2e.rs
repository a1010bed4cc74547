//! End-to-end tests over real TCP connections.
//!
//! Each test starts the server on an ephemeral port through `serve`, drives
//! it with plain line-oriented clients, and triggers shutdown through a
//! oneshot channel standing in for the process signal.

use std::net::SocketAddr;
use std::time::Duration;

use chatroom_server::{serve, AppError, ServerConfig, ShutdownReport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(3);
const HELP_LINES: usize = 5;

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<ShutdownReport, AppError>>,
}

impl TestServer {
    async fn start(max_clients: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            bind: addr.ip(),
            port: addr.port(),
            max_clients,
            verbose: true,
        };
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            serve(listener, &config, async {
                let _ = stopped.await;
            })
            .await
        });
        Self { addr, stop, task }
    }

    async fn shutdown(self) -> ShutdownReport {
        self.stop.send(()).unwrap();
        timeout(Duration::from_secs(10), self.task)
            .await
            .expect("shutdown hung")
            .unwrap()
            .unwrap()
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    /// Connect, send the username and wait until the session is registered
    async fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(name).await;
        // Lines are handled in order, so the help reply follows registration
        client.send("/help").await;
        assert_eq!(client.recv().await, "Help commands:\n");
        for _ in 1..HELP_LINES {
            client.recv().await;
        }
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .unwrap();
        line
    }

    async fn recv_lines(&mut self, n: usize) -> String {
        let mut text = String::new();
        for _ in 0..n {
            text.push_str(&self.recv().await);
        }
        text
    }

    async fn expect_eof(&mut self) {
        assert_eq!(self.recv().await, "", "expected connection close");
    }

    /// Confirm nothing was queued ahead of a fresh reply
    async fn expect_quiet(&mut self) {
        self.send("/help").await;
        assert_eq!(self.recv().await, "Help commands:\n");
        for _ in 1..HELP_LINES {
            self.recv().await;
        }
    }
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_but_sender() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    let mut carol = TestClient::join(server.addr, "carol").await;

    alice.send("hello room").await;

    assert_eq!(bob.recv().await, "alice: hello room\n");
    assert_eq!(carol.recv().await, "alice: hello room\n");
    alice.expect_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_sender_order_preserved() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    for i in 0..20 {
        alice.send(&format!("line {}", i)).await;
    }
    for i in 0..20 {
        assert_eq!(bob.recv().await, format!("alice: line {}\n", i));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_prefixed_command_is_broadcast() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    alice.send("alice: /list").await;

    assert_eq!(bob.recv().await, "alice: alice: /list\n");
    alice.expect_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_whisper_reaches_only_recipient() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;
    let mut carol = TestClient::join(server.addr, "carol").await;

    alice.send("/whisper bob hello").await;

    assert_eq!(bob.recv().await, "[Whisper from alice]: hello\n");
    carol.expect_quiet().await;
    alice.expect_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_whisper_unknown_recipient() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    alice.send("/whisper nobody hi").await;

    assert_eq!(alice.recv().await, "Recipient not found.\n");
    bob.expect_quiet().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_keeps_session_alive() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    alice.send_raw(b"caf\xe9\n/list\n").await;

    assert_eq!(bob.recv().await, "alice: caf\u{FFFD}\n");
    assert_eq!(alice.recv_lines(2).await, "Connected users:\nbob\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_list_shows_other_users() {
    let server = TestServer::start(10).await;
    let _alice = TestClient::join(server.addr, "alice").await;
    let _carol = TestClient::join(server.addr, "carol").await;
    let mut dave = TestClient::join(server.addr, "dave").await;

    dave.send("/list").await;

    assert_eq!(dave.recv_lines(3).await, "Connected users:\nalice\ncarol\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_command() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;

    alice.send("/dance").await;

    assert_eq!(alice.recv().await, "Unknown command.\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_full_server_rejects_extra_client() {
    let server = TestServer::start(2).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let _bob = TestClient::join(server.addr, "bob").await;

    let mut carol = TestClient::connect(server.addr).await;
    carol.send("carol").await;

    assert_eq!(carol.recv().await, "Server is full. Try again later.\n");
    carol.expect_eof().await;

    // Existing sessions are unaffected
    alice.send("/list").await;
    assert_eq!(alice.recv_lines(2).await, "Connected users:\nbob\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_exit_disconnects_and_unregisters() {
    let server = TestServer::start(10).await;
    let mut alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    alice.send("/exit").await;
    alice.expect_eof().await;

    // Unregistration happens before the connection closes
    bob.send("/list").await;
    assert_eq!(bob.recv().await, "No users connected.\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_dropped_client_is_unregistered() {
    let server = TestServer::start(10).await;
    let alice = TestClient::join(server.addr, "alice").await;
    let mut bob = TestClient::join(server.addr, "bob").await;

    drop(alice);

    let mut remaining = String::new();
    for _ in 0..50 {
        bob.send("/list").await;
        remaining = bob.recv().await;
        if remaining == "No users connected.\n" {
            break;
        }
        // Consume the name line of the stale listing
        bob.recv().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, "No users connected.\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    let server = TestServer::start(10).await;
    let mut client = TestClient::connect(server.addr).await;

    client.send(&"n".repeat(32)).await;

    assert_eq!(client.recv().await, "Invalid username.\n");
    client.expect_eof().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_disconnects_everyone() {
    let server = TestServer::start(10).await;
    let addr = server.addr;
    let mut clients = Vec::new();
    for name in ["alice", "bob", "carol"] {
        clients.push(TestClient::join(addr, name).await);
    }

    let report = server.shutdown().await;
    assert_eq!(report.sessions_notified, 3);

    for client in &mut clients {
        assert_eq!(client.recv().await, "Server is shutting down.\n");
        client.expect_eof().await;
    }

    // Listening socket is released
    assert!(TcpStream::connect(addr).await.is_err());
}
