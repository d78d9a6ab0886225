//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes by path prefix:
//! - `/slow/...`    200 after a short delay (used to observe concurrency)
//! - `/hang/...`    sleeps longer than any test timeout
//! - `/missing/...` 404
//! - anything else  200 with body `body of <path>`
//!
//! Counts requests, the number handled at once, and the peak of that number.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ServerStats {
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    user_agents: Mutex<Vec<String>>,
}

impl ServerStats {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }
}

pub struct TestServer {
    base: String,
    pub stats: Arc<ServerStats>,
}

impl TestServer {
    /// Absolute URL for `path` (must start with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Body served for a 200 response on `path`.
pub fn body_for(path: &str) -> Vec<u8> {
    format!("body of {}", path).into_bytes()
}

/// Starts a server in a background thread; it runs until the process exits.
pub fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let stats = Arc::new(ServerStats::default());
    let server_stats = Arc::clone(&stats);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let stats = Arc::clone(&server_stats);
            thread::spawn(move || handle(stream, &stats));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        stats,
    }
}

fn handle(mut stream: std::net::TcpStream, stats: &ServerStats) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf).into_owned();
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let user_agent = request
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("user-agent"))
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_default();

    stats.requests.fetch_add(1, Ordering::SeqCst);
    stats.user_agents.lock().unwrap().push(user_agent);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.peak.fetch_max(now, Ordering::SeqCst);

    if path.starts_with("/slow/") {
        thread::sleep(Duration::from_millis(150));
    } else if path.starts_with("/hang/") {
        thread::sleep(Duration::from_secs(4));
    }

    let (status, body) = if path.starts_with("/missing/") {
        ("404 Not Found", b"not found".to_vec())
    } else {
        ("200 OK", body_for(&path))
    };
    // Leave the count before replying: the client only frees its slot after
    // reading the reply, so the count never overlaps the next request.
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}
