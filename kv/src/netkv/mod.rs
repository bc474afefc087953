//! The client acceptor and per-client request loop: a named-pipe
//! registration endpoint, semaphore-gated admission control, and a bounded
//! queue drained by a fixed pool of client-handler threads.

pub mod protocol;

use std::collections::HashMap;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use protocol::{ConnectHeader, Request, RequestOpcode, ACK_FAIL, ACK_OK};

use crate::kvs::Server;
use crate::sync::{BoundedQueue, Semaphore};

/// A connected client's channel triple plus its identity.
#[derive(Clone)]
struct Connection {
    id: String,
    header: ConnectHeader,
}

fn mkfifo(path: &str) -> std::io::Result<()> {
    let c_path = CString::new(path).map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "nul in path"))?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(err);
        }
    }
    Ok(())
}

/// Spawns a dedicated watcher thread that sets `flag` when `SIGUSR1`
/// arrives. All cleanup happens later, in the acceptor's own loop — the
/// handler here does only the flag set, preserving async-signal safety.
fn watch_sigusr1(flag: Arc<AtomicBool>) -> std::io::Result<thread::JoinHandle<()>> {
    let mut signals = signal_hook::iterator::Signals::new([signal_hook::consts::SIGUSR1])?;
    Ok(thread::spawn(move || {
        for _signal in signals.forever() {
            flag.store(true, Ordering::SeqCst);
        }
    }))
}

/// Runs the client acceptor loop until the registration endpoint can no
/// longer be opened for reading (the caller is expected to run this on its
/// own thread and join it). Accepts connections on `registration_path`,
/// admits up to `managing_threads`
/// concurrent clients, and services subscribe/unsubscribe/disconnect
/// requests. Responds to `SIGUSR1` by disconnecting every connected client;
/// the registration endpoint itself stays open.
pub fn run_acceptor(server: Arc<Server>, registration_path: &str, managing_threads: usize) -> std::io::Result<()> {
    mkfifo(registration_path)?;

    let empty_slots = Arc::new(Semaphore::new(managing_threads));
    let filled_slots = Arc::new(Semaphore::new(0));
    let queue: Arc<BoundedQueue<Connection>> = Arc::new(BoundedQueue::new(managing_threads));
    let connections: Arc<Mutex<HashMap<String, Connection>>> = Arc::new(Mutex::new(HashMap::new()));
    let sigusr1 = Arc::new(AtomicBool::new(false));
    let _signal_watcher = watch_sigusr1(sigusr1.clone())?;

    let mut handler_handles = Vec::with_capacity(managing_threads);
    for _ in 0..managing_threads {
        let server = server.clone();
        let queue = queue.clone();
        let empty_slots = empty_slots.clone();
        let filled_slots = filled_slots.clone();
        let connections = connections.clone();
        handler_handles.push(thread::spawn(move || loop {
            filled_slots.acquire();
            let conn = queue.pop();
            run_client_loop(&server, &conn);
            connections.lock().unwrap().remove(&conn.id);
            empty_slots.release();
        }));
    }

    loop {
        if sigusr1.swap(false, Ordering::SeqCst) {
            disconnect_all(&server, &connections);
        }

        let mut registration = match OpenOptions::new().read(true).open(registration_path) {
            Ok(f) => f,
            Err(_) => break,
        };
        let request = match Request::read(&mut registration) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if request.opcode != RequestOpcode::Connect {
            continue;
        }

        empty_slots.acquire();
        let conn = Connection { id: request.header.req_path.clone(), header: request.header.clone() };
        let accepted = queue.try_push(conn.clone());
        let ack = if accepted { ACK_OK } else { ACK_FAIL };
        if accepted {
            connections.lock().unwrap().insert(conn.id.clone(), conn);
            filled_slots.release();
        } else {
            empty_slots.release();
        }

        if let Ok(mut resp) = OpenOptions::new().write(true).open(&request.header.resp_path) {
            let _ = resp.write_all(&[ack]);
        }
    }

    for handle in handler_handles {
        let _ = handle.join();
    }
    Ok(())
}

/// Iterates currently-connected clients, removing each from the
/// subscription table and waking its blocked request reader with a
/// synthetic `DISCONNECT`, so the handler thread observes it and exits
/// through the normal per-client teardown path.
fn disconnect_all(server: &Server, connections: &Mutex<HashMap<String, Connection>>) {
    let conns: Vec<Connection> = connections.lock().unwrap().values().cloned().collect();
    for conn in conns {
        server.remove_client(&conn.id);
        let poison = Request { opcode: RequestOpcode::Disconnect, header: conn.header.clone(), key: None };
        if let Ok(mut req) = OpenOptions::new().write(true).open(&conn.header.req_path) {
            let _ = poison.write(&mut req);
        }
    }
}

/// Services one client's request channel until it disconnects or the
/// channel errors out. Each request gets a one-byte ack on the client's
/// response channel.
fn run_client_loop(server: &Server, conn: &Connection) {
    loop {
        let mut req_file = match OpenOptions::new().read(true).open(&conn.header.req_path) {
            Ok(f) => f,
            Err(_) => break,
        };
        let request = match Request::read(&mut req_file) {
            Ok(r) => r,
            Err(_) => break,
        };

        let ack = match request.opcode {
            RequestOpcode::Disconnect => {
                server.remove_client(&conn.id);
                send_ack(&conn.header.resp_path, ACK_OK);
                break;
            }
            RequestOpcode::Subscribe => {
                let key = request.key.as_deref().unwrap_or("");
                match server.subscribe(&conn.id, &conn.header.notif_path, key) {
                    Ok(()) => ACK_OK,
                    Err(_) => ACK_FAIL,
                }
            }
            RequestOpcode::Unsubscribe => {
                let key = request.key.as_deref().unwrap_or("");
                match server.unsubscribe(&conn.id, key) {
                    Ok(()) => ACK_OK,
                    Err(_) => ACK_FAIL,
                }
            }
            RequestOpcode::Connect => ACK_FAIL,
        };
        send_ack(&conn.header.resp_path, ack);
    }
}

fn send_ack(resp_path: &str, ack: u8) {
    if let Ok(mut resp) = OpenOptions::new().write(true).open(resp_path) {
        let _ = resp.write_all(&[ack]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkfifo_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reg").to_str().unwrap().to_string();
        mkfifo(&path).unwrap();
        mkfifo(&path).unwrap();
    }
}
