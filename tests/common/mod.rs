//! In-process HTTP server serving canned replies to the client under test

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned response
#[derive(Debug, Clone)]
pub enum Reply {
    /// `200 text/event-stream`, each chunk written separately
    Stream {
        chunks: Vec<Vec<u8>>,
        delay: Duration,
        /// Keep the connection open this long after the last chunk
        hold: Duration,
    },
    /// Any status with a plain body
    Status { code: u16, body: String },
    /// Exactly these bytes, then the connection is held open
    Raw { bytes: Vec<u8>, hold: Duration },
}

impl Reply {
    pub fn stream<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Reply::Stream {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            delay: Duration::from_millis(5),
            hold: Duration::ZERO,
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        match self {
            Reply::Stream { chunks, hold, .. } => Reply::Stream { chunks, delay, hold },
            other => other,
        }
    }

    pub fn with_hold(self, hold: Duration) -> Self {
        match self {
            Reply::Stream { chunks, delay, .. } => Reply::Stream { chunks, delay, hold },
            other => other,
        }
    }

    /// Accept the request and never answer
    pub fn silent(hold: Duration) -> Self {
        Reply::Raw {
            bytes: Vec::new(),
            hold,
        }
    }

    pub fn json(body: &str) -> Self {
        Reply::Status {
            code: 200,
            body: body.to_string(),
        }
    }
}

/// `data: {...}` line carrying one content delta
pub fn delta_line(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content }, "finish_reason": null }] })
    )
}

pub const DONE_LINE: &str = "data: [DONE]\n\n";

/// A request as received by the server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub head: String,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    /// Serve `replies` in order, one per connection; the last one repeats
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut index = 0;
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let reply = replies[index.min(replies.len() - 1)].clone();
                index += 1;
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = handle(socket, reply, recorded).await;
                });
            }
        });

        MockServer {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break data.len();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let body_end = (header_end + content_length).min(data.len());
    Ok(Recorded {
        head,
        body: String::from_utf8_lossy(&data[header_end..body_end]).to_string(),
    })
}

async fn handle(
    mut socket: TcpStream,
    reply: Reply,
    recorded: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()> {
    let request = read_request(&mut socket).await?;
    recorded.lock().unwrap().push(request);

    match reply {
        Reply::Stream { chunks, delay, hold } => {
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
                )
                .await?;
            socket.flush().await?;
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                socket.write_all(&chunk).await?;
                socket.flush().await?;
            }
            tokio::time::sleep(hold).await;
        }
        Reply::Status { code, body } => {
            let head = format!(
                "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                code,
                body.len()
            );
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(body.as_bytes()).await?;
            socket.flush().await?;
        }
        Reply::Raw { bytes, hold } => {
            socket.write_all(&bytes).await?;
            socket.flush().await?;
            tokio::time::sleep(hold).await;
        }
    }

    socket.shutdown().await
}
