use std::fs::OpenOptions;
use std::io::{BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use kv::netkv::protocol::{ConnectHeader, NotifyOpcode, NotifyRecord, Request, RequestOpcode};
use kvcli::script::{parse_client_line, ClientCommand};

/// `client <client_id> <registration_endpoint>`
#[derive(Debug, Parser)]
#[command(author, version, about = "kv storage client")]
struct Args {
    client_id: String,
    registration_endpoint: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn pipe_path(kind: &str, client_id: &str) -> String {
    format!("/tmp/{}-{}", kind, client_id)
}

fn main() -> Result<()> {
    kvcli::setup_panic_hooks();

    let args = Args::parse();
    let log_dir = kvcli::default_log_dir();
    let _guards = kvcli::trace::init_logging(&log_dir, "client", &args.log_level)?;

    let req_path = pipe_path("req", &args.client_id);
    let resp_path = pipe_path("resp", &args.client_id);
    let notif_path = pipe_path("notif", &args.client_id);

    for path in [&req_path, &resp_path, &notif_path] {
        make_fifo(path)?;
    }

    let header = ConnectHeader { req_path: req_path.clone(), resp_path: resp_path.clone(), notif_path: notif_path.clone() };

    let connect = Request { opcode: RequestOpcode::Connect, header: header.clone(), key: None };
    send_request(&args.registration_endpoint, &connect, &resp_path)
        .with_context(|| format!("failed to connect to {}", args.registration_endpoint))?;
    info!("connected as {}", args.client_id);

    {
        let req_path = req_path.clone();
        let header = header.clone();
        ctrlc::set_handler(move || {
            let disconnect = Request { opcode: RequestOpcode::Disconnect, header: header.clone(), key: None };
            let _ = send_request(&req_path, &disconnect, &header.resp_path);
            std::process::exit(0);
        })
        .expect("error setting Ctrl-C handler");
    }

    let running = Arc::new(AtomicBool::new(true));
    let notif_running = running.clone();
    let notif_path_for_thread = notif_path.clone();
    let notifier = thread::spawn(move || {
        while notif_running.load(Ordering::SeqCst) {
            let Ok(mut f) = std::fs::File::open(&notif_path_for_thread) else { break };
            let Ok(record) = NotifyRecord::read(&mut f) else { continue };
            match record.opcode {
                NotifyOpcode::Write => println!("({}, {})", record.key, record.value),
                NotifyOpcode::Delete => println!("({}, DELETED)", record.key),
            }
        }
    });

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match parse_client_line(&line) {
            ClientCommand::Subscribe(key) => {
                let req = Request { opcode: RequestOpcode::Subscribe, header: header.clone(), key: Some(key) };
                send_request(&req_path, &req, &resp_path)?;
            }
            ClientCommand::Unsubscribe(key) => {
                let req = Request { opcode: RequestOpcode::Unsubscribe, header: header.clone(), key: Some(key) };
                send_request(&req_path, &req, &resp_path)?;
            }
            ClientCommand::Disconnect => {
                let req = Request { opcode: RequestOpcode::Disconnect, header: header.clone(), key: None };
                send_request(&req_path, &req, &resp_path)?;
                break;
            }
            ClientCommand::Invalid(text) => {
                eprintln!("unrecognized command: {}", text);
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    drop(notifier);
    Ok(())
}

fn make_fifo(path: &str) -> std::io::Result<()> {
    let c_path = std::ffi::CString::new(path).unwrap();
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(err);
        }
    }
    Ok(())
}

fn send_request(channel_path: &str, request: &Request, resp_path: &str) -> Result<()> {
    let mut channel = OpenOptions::new()
        .write(true)
        .open(channel_path)
        .with_context(|| format!("failed to open channel {}", channel_path))?;
    request.write(&mut channel).context("failed to write request")?;
    drop(channel);

    let mut resp = OpenOptions::new().read(true).open(resp_path).context("failed to open response channel")?;
    let mut ack = [0u8; 1];
    resp.read_exact(&mut ack)?;
    if ack[0] != 0 {
        anyhow::bail!("request refused by server");
    }
    Ok(())
}
