//! Line-protocol TCP transport over the endpoint registry.
//!
//! One request per line:
//!
//! ```text
//! GET <path>            -> the endpoint payload (data payloads carry
//!                          their own trailing newline)
//! PUT <path> [payload]  -> "ok <consumed>\n"
//! anything else         -> "err <reason>\n"
//! ```
//!
//! This is one pluggable transport over the registry, not part of the
//! accounting contract.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::exposure::EndpointRegistry;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Running exposure server. `stop` requests shutdown and joins the
/// listener thread.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound address, useful with a `:0` port request.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.thread.join();
    }
}

/// Bind `addr` and serve the registry until the handle is stopped.
///
/// A bind failure is returned to the caller; per the error design the
/// caller logs it and keeps accounting unexposed rather than aborting.
pub fn serve(registry: Arc<EndpointRegistry>, addr: &str) -> std::io::Result<ServerHandle> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let thread = thread::spawn(move || accept_loop(listener, registry, stop_flag));

    Ok(ServerHandle { addr, stop, thread })
}

fn accept_loop(listener: TcpListener, registry: Arc<EndpointRegistry>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "exposure connection accepted");
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &registry) {
                        debug!(%err, "exposure connection closed with error");
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(%err, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_connection(stream: TcpStream, registry: &EndpointRegistry) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        let response = respond(registry, line.trim_end());
        writer.write_all(response.as_bytes())?;
        writer.flush()?;
    }
    Ok(())
}

/// Turn one request line into one response string.
fn respond(registry: &EndpointRegistry, line: &str) -> String {
    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    };

    match verb {
        "GET" => match registry.read(rest) {
            Ok(payload) => payload,
            Err(err) => format!("err {err}\n"),
        },
        "PUT" => {
            let (path, payload) = match rest.split_once(' ') {
                Some((path, payload)) => (path, payload.as_bytes()),
                None => (rest, &b"1"[..]),
            };
            match registry.write(path, payload) {
                Ok(consumed) => format!("ok {consumed}\n"),
                Err(err) => format!("err {err}\n"),
            }
        }
        "LIST" => {
            let mut out = String::new();
            for path in registry.paths() {
                out.push_str(&path);
                out.push('\n');
            }
            out.push_str("end\n");
            out
        }
        _ => format!("err unknown verb {verb:?}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::Endpoint;

    fn registry() -> Arc<EndpointRegistry> {
        let registry = Arc::new(EndpointRegistry::new());
        registry
            .register("core0/data", Endpoint::Read(Arc::new(|| "3 4\n".into())))
            .unwrap();
        registry
            .register("core0/reset", Endpoint::Write(Arc::new(|p: &[u8]| p.len())))
            .unwrap();
        registry
    }

    #[test]
    fn test_respond_get() {
        let registry = registry();
        assert_eq!(respond(&registry, "GET core0/data"), "3 4\n");
        assert!(respond(&registry, "GET nope").starts_with("err "));
    }

    #[test]
    fn test_respond_put_counts_payload() {
        let registry = registry();
        assert_eq!(respond(&registry, "PUT core0/reset abcde"), "ok 5\n");
        // Bare PUT still carries a one-byte payload so the reset fires.
        assert_eq!(respond(&registry, "PUT core0/reset"), "ok 1\n");
    }

    #[test]
    fn test_respond_list_and_unknown_verb() {
        let registry = registry();
        assert_eq!(
            respond(&registry, "LIST"),
            "core0/data\ncore0/reset\nend\n"
        );
        assert!(respond(&registry, "DELETE x").starts_with("err "));
    }
}
