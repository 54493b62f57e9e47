//! Scripted HTTP/1.1 responder on 127.0.0.1 for client tests.
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Serves one scripted `(status, body)` per incoming connection, in order,
/// and records every raw request it saw. Gives up after ten idle seconds.
pub(crate) struct ScriptedServer {
    pub url: String,
    handle: JoinHandle<Vec<String>>,
}

impl ScriptedServer {
    pub fn start(script: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        listener.set_nonblocking(true).expect("nonblocking listener");

        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            let mut script = script.into_iter();
            let mut next = script.next();
            let mut deadline = Instant::now() + Duration::from_secs(10);

            while let Some((status, body)) = next {
                if Instant::now() > deadline {
                    break;
                }
                let mut stream = match listener.accept() {
                    Ok((stream, _)) => stream,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                    Err(_) => break,
                };
                stream.set_nonblocking(false).expect("blocking stream");
                requests.push(read_request(&mut stream));

                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();

                next = script.next();
                deadline = Instant::now() + Duration::from_secs(10);
            }
            requests
        });

        Self { url, handle }
    }

    /// Wait for the script to finish and return the recorded requests.
    pub fn requests(self) -> Vec<String> {
        self.handle.join().expect("server thread panicked")
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
