#![allow(dead_code)]

pub mod resource_tree {
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// A throwaway directory of resources.
    pub struct Tree {
        dir: TempDir,
    }

    impl Tree {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        pub fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        /// Write `content` to `rel`, creating parent directories.
        pub fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.path(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            path
        }

        pub fn mkdir(&self, rel: &str) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(&path).unwrap();
            path
        }

        /// Rewrite `rel` and push its modification time `secs` into the
        /// future, so staleness checks see it regardless of timer resolution.
        pub fn rewrite_later(&self, rel: &str, content: &str, secs: u64) -> PathBuf {
            let path = self.write(rel, content);
            let file = File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() + Duration::from_secs(secs))
                .unwrap();
            path
        }
    }
}

pub mod test_server {
    use jolt::dispatcher::Application;
    use jolt::runtime_config::DEFAULT_STACK_SIZE;
    use jolt::server::{BodyLimits, HttpServer, JoltService, ServerHandle};
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Once};

    /// Ensures May coroutines are configured only once, with the same stack
    /// the binary uses
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(DEFAULT_STACK_SIZE);
        });
    }

    /// Serve `app` on an ephemeral port.
    pub fn start(app: Application, limits: BodyLimits) -> (ServerHandle, SocketAddr) {
        setup_may_runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handle = HttpServer(JoltService::new(Arc::new(app), limits))
            .start(addr)
            .unwrap();
        handle.wait_ready().unwrap();
        (handle, addr)
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Raw HTTP/1.1 exchange; reads until the server goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        buf
    }

    pub fn get(addr: &SocketAddr, path: &str, extra_headers: &str) -> Vec<u8> {
        let req = format!("GET {path} HTTP/1.1\r\nHost: x\r\n{extra_headers}\r\n");
        send_request(addr, req.as_bytes())
    }

    /// Status, lowercase headers and body of a raw response.
    pub fn parse_parts(resp: &[u8]) -> (u16, Vec<(String, String)>, Vec<u8>) {
        let split = resp
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap_or(resp.len());
        let head = String::from_utf8_lossy(&resp[..split]);
        let body = resp.get(split + 4..).unwrap_or_default().to_vec();
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), val.trim().to_string()));
            }
        }
        (status, headers, body)
    }

    pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
