//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed set of routes, each with scripted behavior (plain body,
//! status code, a number of failures before success, truncated bodies, or a
//! stalled body). Counts GETs per path so tests can assert retry behavior.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with the body.
    Body(Vec<u8>),
    /// Bare status with an empty body.
    Status(u16),
    /// `failures` responses with `status`, then the body.
    FlakyThenBody { failures: u32, status: u16, body: Vec<u8> },
    /// `truncations` responses that advertise the full length but close after
    /// half the body, then the full body.
    TruncatedThenBody { truncations: u32, body: Vec<u8> },
    /// Headers and the first bytes, then silence for a long time.
    Stall(Vec<u8>),
}

#[derive(Clone)]
pub struct ArtifactServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

impl ArtifactServer {
    /// `http://127.0.0.1:PORT/<path>`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// Number of GETs received for `path`.
    pub fn hits(&self, path: &str) -> u32 {
        let key = format!("/{}", path.trim_start_matches('/'));
        self.hits.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

/// Starts the server on a loopback port in a background thread. It runs
/// until the process exits.
pub fn start(routes: Vec<(&str, Route)>) -> ArtifactServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, r)| (format!("/{}", p.trim_start_matches('/')), r))
            .collect(),
    );
    let hits: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
    let server_hits = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&server_hits);
            thread::spawn(move || handle(stream, &routes, &hits));
        }
    });
    ArtifactServer {
        base: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>, hits: &Mutex<HashMap<String, u32>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let mut first = request.lines().next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("/").to_string();
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let hit = {
        let mut h = hits.lock().unwrap();
        let n = h.entry(path.clone()).or_insert(0);
        *n += 1;
        *n
    };

    match routes.get(&path) {
        None => status(&mut stream, 404),
        Some(Route::Body(body)) => full(&mut stream, body),
        Some(Route::Status(code)) => status(&mut stream, *code),
        Some(Route::FlakyThenBody { failures, status: code, body }) => {
            if hit <= *failures {
                status(&mut stream, *code)
            } else {
                full(&mut stream, body)
            }
        }
        Some(Route::TruncatedThenBody { truncations, body }) => {
            if hit <= *truncations {
                head(&mut stream, "200 OK", body.len());
                let _ = stream.write_all(&body[..body.len() / 2]);
            } else {
                full(&mut stream, body)
            }
        }
        Some(Route::Stall(body)) => {
            head(&mut stream, "200 OK", body.len());
            let _ = stream.write_all(&body[..body.len().min(16)]);
            let _ = stream.flush();
            thread::sleep(Duration::from_secs(30));
        }
    }
}

fn head(stream: &mut TcpStream, status_line: &str, len: usize) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        status_line, len
    );
    let _ = stream.write_all(response.as_bytes());
}

fn full(stream: &mut TcpStream, body: &[u8]) {
    head(stream, "200 OK", body.len());
    let _ = stream.write_all(body);
}

fn status(stream: &mut TcpStream, code: u16) {
    let reason = match code {
        404 => "Not Found",
        410 => "Gone",
        403 => "Forbidden",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let _ = stream.write_all(
        format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", code, reason).as_bytes(),
    );
}
