//! In-memory doubles shared by the unit tests: a scripted serial link,
//! a capturing display buffer, and a minimal HTTP stub server.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One scripted read outcome on the fake link.
enum ReadStep {
    Data(Vec<u8>),
    Timeout,
}

/// A serial link double. Each poll yields at most one scripted chunk,
/// then times out like a real port with nothing buffered; writes are
/// captured for assertions.
pub(crate) struct ScriptedLink {
    reads: VecDeque<ReadStep>,
    sent: Arc<Mutex<Vec<u8>>>,
    fail_io: bool,
}

impl ScriptedLink {
    pub(crate) fn empty() -> Self {
        Self {
            reads: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_io: false,
        }
    }

    pub(crate) fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        let mut reads = VecDeque::new();
        for chunk in chunks {
            reads.push_back(ReadStep::Data(chunk));
            reads.push_back(ReadStep::Timeout);
        }
        Self {
            reads,
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_io: false,
        }
    }

    /// A link whose every operation fails with a hard I/O error.
    pub(crate) fn failing() -> Self {
        Self {
            reads: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_io: true,
        }
    }

    /// Handle onto everything written to the link.
    pub(crate) fn sent(&self) -> Arc<Mutex<Vec<u8>>> {
        self.sent.clone()
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link failed"));
        }
        match self.reads.pop_front() {
            Some(ReadStep::Data(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.reads.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
            Some(ReadStep::Timeout) | None => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
            }
        }
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link failed"));
        }
        self.sent.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link failed"));
        }
        Ok(())
    }
}

/// A `Write` sink backed by shared memory, standing in for the station
/// display in receiver tests.
#[derive(Clone)]
pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A display sink that always fails, to force a cycle error.
pub(crate) struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "display gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "display gone"))
    }
}

/// Canned reply for one HTTP method on the stub server.
#[derive(Clone)]
pub(crate) struct StubResponse {
    status: u16,
    body: String,
}

impl StubResponse {
    pub(crate) fn ok() -> Self {
        Self {
            status: 200,
            body: String::new(),
        }
    }

    pub(crate) fn ok_body(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub(crate) fn error(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// Minimal HTTP/1.1 stub: replies per method (GET/POST/PUT) and records
/// "METHOD path" lines for assertions.
pub(crate) struct StubServer {
    pub(crate) base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub(crate) async fn spawn(get: StubResponse, post: StubResponse, put: StubResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("stub server addr");
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                let (get, post, put) = (get.clone(), post.clone(), put.clone());
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut total = 0;
                    let header_end = loop {
                        match socket.read(&mut buf[total..]).await {
                            Ok(0) => return,
                            Ok(n) => {
                                total += n;
                                if let Some(pos) = find_header_end(&buf[..total]) {
                                    break pos;
                                }
                                if total == buf.len() {
                                    return;
                                }
                            }
                            Err(_) => return,
                        }
                    };

                    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
                    let mut lines = head.lines();
                    let request_line = lines.next().unwrap_or_default();
                    let mut parts = request_line.split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let path = parts.next().unwrap_or_default().to_string();
                    log.lock().unwrap().push(format!("{} {}", method, path));

                    // Drain the body so the client never sees a reset mid-write
                    let content_length = lines
                        .filter_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .next()
                        .unwrap_or(0);
                    let mut body_read = total - header_end;
                    while body_read < content_length {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => body_read += n,
                        }
                    }

                    let reply = match method.as_str() {
                        "GET" => get,
                        "POST" => post,
                        _ => put,
                    };
                    let reason = if reply.status < 400 { "OK" } else { "ERR" };
                    let response = format!(
                        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        reply.status,
                        reason,
                        reply.body.len(),
                        reply.body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub(crate) fn request_log(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}
