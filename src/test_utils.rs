//! Test utilities: a scripted round source that records every call, and a
//! local HTTP server answering with canned responses
//!
//! Scripted responses are served in the order they were scripted. Once a
//! script runs dry the source answers with a network error, so a loop under
//! test keeps retrying until its cancellation predicate stops it.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::source::RoundSource;
use crate::types::{PollResult, Position};
use crate::{PollError, Result};

/// A call observed by [`ScriptedSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Initial,
    Await(Position),
}

#[derive(Default)]
struct Script {
    initial: VecDeque<Result<Position>>,
    advances: VecDeque<(Duration, Result<PollResult>)>,
    calls: Vec<(Call, Instant)>,
}

/// Round source answering from pre-recorded responses
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful baseline response
    pub fn initial(self, position: Position) -> Self {
        self.script.lock().unwrap().initial.push_back(Ok(position));
        self
    }

    /// Queue a failed baseline response
    pub fn initial_failure(self, error: PollError) -> Self {
        self.script.lock().unwrap().initial.push_back(Err(error));
        self
    }

    /// Queue a poll that succeeds immediately
    pub fn advance(self, result: PollResult) -> Self {
        self.advance_after(Duration::ZERO, result)
    }

    /// Queue a poll that succeeds after `delay` of (tokio) time
    pub fn advance_after(self, delay: Duration, result: PollResult) -> Self {
        self.script.lock().unwrap().advances.push_back((delay, Ok(result)));
        self
    }

    /// Queue a poll that fails immediately
    pub fn advance_failure(self, error: PollError) -> Self {
        self.script.lock().unwrap().advances.push_back((Duration::ZERO, Err(error)));
        self
    }

    /// Calls observed so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.iter().map(|(call, _)| *call).collect()
    }

    /// Calls observed so far with the time each one was made
    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.script.lock().unwrap().calls.clone()
    }
}

fn exhausted() -> PollError {
    PollError::network_failed("scripted source exhausted")
}

#[async_trait::async_trait]
impl RoundSource for ScriptedSource {
    async fn fetch_initial_position(&self) -> Result<Position> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((Call::Initial, Instant::now()));
        script.initial.pop_front().unwrap_or_else(|| Err(exhausted()))
    }

    async fn await_next_position(&self, from: Position) -> Result<PollResult> {
        let (delay, response) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push((Call::Await(from), Instant::now()));
            script.advances.pop_front().unwrap_or_else(|| (Duration::ZERO, Err(exhausted())))
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A canned answer for every request path starting with `prefix`
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: &'static str,
    pub status: u16,
    pub body: &'static str,
}

impl Route {
    pub fn new(prefix: &'static str, status: u16, body: &'static str) -> Self {
        Self { prefix, status, body }
    }
}

/// HTTP/1.1 server on an ephemeral local port
///
/// The first route whose prefix matches the request path answers it; anything
/// else gets a 404. Every connection is closed after one response.
pub struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl CannedServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind local listener");
        let addr = listener.local_addr().expect("listener address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let _ = answer(socket, &routes, &seen).await;
                });
            }
        });

        Self { base_url: format!("http://{addr}"), requests, task }
    }

    /// Base URL without a trailing slash
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Request paths (with query) in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for CannedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    mut socket: TcpStream,
    routes: &[Route],
    seen: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    seen.lock().unwrap().push(path.clone());

    let (status, body) = routes
        .iter()
        .find(|route| path.starts_with(route.prefix))
        .map(|route| (route.status, route.body))
        .unwrap_or((404, r#"{"message": "not found"}"#));

    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        reason(status),
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
