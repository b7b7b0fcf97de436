//! Scripted in-memory server shared by the integration tests

#![allow(dead_code)]

use fuzzball::{ClientConfig, Transport};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct Shared {
    incoming: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    closed: bool,
    shut_down: bool,
}

/// Transport half handed to the client
///
/// Reads return the scripted chunks in order, then `WouldBlock` (which the
/// client treats as a read timeout) until the script is closed.
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Test half: feeds data and inspects what the client wrote
#[derive(Clone)]
pub struct MockServer {
    shared: Arc<Mutex<Shared>>,
}

pub fn mock_pair() -> (MockTransport, MockServer) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    (
        MockTransport {
            shared: Arc::clone(&shared),
        },
        MockServer { shared },
    )
}

impl MockServer {
    pub fn send(&self, data: &[u8]) -> &Self {
        self.shared.lock().unwrap().incoming.push_back(data.to_vec());
        self
    }

    pub fn send_line(&self, line: &str) -> &Self {
        self.send(format!("{}\r\n", line).as_bytes())
    }

    pub fn close(&self) {
        self.shared.lock().unwrap().closed = true;
    }

    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().unwrap().written.clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.written_text()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn clear_written(&self) {
        self.shared.lock().unwrap().written.clear();
    }

    pub fn was_shut_down(&self) -> bool {
        self.shared.lock().unwrap().shut_down
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        match shared.incoming.pop_front() {
            Some(mut chunk) => {
                let n = buf.len().min(chunk.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    shared.incoming.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
            None if shared.closed => Ok(0),
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no scripted data")),
        }
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        if shared.shut_down {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "shut down"));
        }
        shared.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.shared.lock().unwrap().shut_down = true;
        Ok(())
    }
}

/// Defaults with short timeouts suitable for the scripted transport
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.timeouts.banner_secs = 1;
    config.timeouts.negotiate_secs = 1;
    config.timeouts.login_secs = 1;
    config.timeouts.multiline_secs = 0;
    config.timeouts.idle_poll_ms = 10;
    config
}

/// A loopback TCP connection whose server half runs `script` on its own
/// thread, for tests that need real read timeouts
///
/// The server half is handed back through the join handle so it stays open
/// until the test joins it.
pub fn tcp_server<F>(script: F) -> (TcpStream, JoinHandle<TcpStream>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (mut server, _) = listener.accept().unwrap();

    let handle = thread::spawn(move || {
        script(&mut server);
        server
    });
    (client, handle)
}

pub fn send_lines(stream: &mut TcpStream, lines: &[&str]) {
    for line in lines {
        stream.write_all(format!("{}\r\n", line).as_bytes()).unwrap();
    }
    stream.flush().unwrap();
}
