//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes:
//! - `/body/<n>`: 200 with an `n`-byte body.
//! - `/slow`: 200 advertising 1 GiB, then 16 KiB every 20 ms until the client leaves.
//! - `/status/<code>`: that status with a short body.
//!
//! Every response carries `Connection: close`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Starts the server in a background thread. Returns the base URL without a
/// trailing slash (e.g. "http://127.0.0.1:12345"). Runs until the process exits.
pub fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    if let Some(len) = path.strip_prefix("/body/") {
        let len: usize = len.parse().unwrap_or(0);
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            len
        );
        let _ = stream.write_all(head.as_bytes());
        let chunk = vec![0xA5u8; 64 * 1024];
        let mut left = len;
        while left > 0 {
            let take = left.min(chunk.len());
            if stream.write_all(&chunk[..take]).is_err() {
                return;
            }
            left -= take;
        }
        return;
    }

    if path == "/slow" {
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 1073741824\r\nConnection: close\r\n\r\n";
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        let chunk = vec![0x5Au8; 16 * 1024];
        loop {
            if stream.write_all(&chunk).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    if let Some(code) = path.strip_prefix("/status/") {
        let code: u32 = code.parse().unwrap_or(500);
        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: 5\r\nConnection: close\r\n\r\nerror",
            code
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let _ = stream.write_all(
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    );
}
