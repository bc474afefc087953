//! Fans out write/delete events to subscribers, outside any data-table or
//! subscription-table lock.

use std::fs::OpenOptions;

use crate::netkv::protocol::{NotifyOpcode, NotifyRecord};
use crate::subscription::SubscriptionTable;

/// A committed mutation that subscribers of `key` should learn about.
pub enum Event {
    Write { key: String, value: String },
    Delete { key: String },
}

impl Event {
    fn key(&self) -> &str {
        match self {
            Event::Write { key, .. } => key,
            Event::Delete { key } => key,
        }
    }

    fn record(&self) -> NotifyRecord {
        match self {
            Event::Write { key, value } => {
                NotifyRecord { opcode: NotifyOpcode::Write, key: key.clone(), value: value.clone() }
            }
            Event::Delete { key } => {
                NotifyRecord { opcode: NotifyOpcode::Delete, key: key.clone(), value: String::new() }
            }
        }
    }
}

/// Snapshots `event.key()`'s subscribers under the subscription table's
/// shared lock, releases it, then writes one notification record per
/// subscriber. A subscriber whose channel write fails is dropped from every
/// subscription (its client resources are reaped lazily by whichever
/// handler next observes the broken channel). For `Delete` events, the
/// subscription row is pruned after dispatch, per §4.3.
pub fn dispatch(subscriptions: &SubscriptionTable, event: Event) {
    let key = event.key().to_string();
    let subscribers = subscriptions.snapshot_subscribers(&key);
    let record = event.record();

    for subscriber in &subscribers {
        if send(&subscriber.notif_path, &record).is_err() {
            log::warn!("notification channel broken for client {}, removing", subscriber.client_id);
            subscriptions.remove_client(&subscriber.client_id);
        }
    }

    if let Event::Delete { .. } = event {
        subscriptions.delete_key(&key);
    }
}

fn send(notif_path: &str, record: &NotifyRecord) -> std::io::Result<()> {
    // Opened for each notification rather than held open: a SIGPIPE on a
    // disconnected reader must only fail this write, not the process, so
    // writers open the channel fresh and treat any error as "drop the
    // subscriber" rather than a fatal condition.
    let mut f = OpenOptions::new().write(true).open(notif_path)?;
    record.write(&mut f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Subscriber;
    use std::io::Read;

    #[test]
    fn write_event_delivers_to_subscriber_and_keeps_row() {
        let dir = tempfile::tempdir().unwrap();
        let notif_path = dir.path().join("notif1");
        unsafe {
            let c_path = std::ffi::CString::new(notif_path.to_str().unwrap()).unwrap();
            libc::mkfifo(c_path.as_ptr(), 0o600);
        }

        let subs = SubscriptionTable::new();
        subs.subscribe("x", Subscriber { client_id: "c1".into(), notif_path: notif_path.to_str().unwrap().into() });

        let notif_path_clone = notif_path.clone();
        let reader = std::thread::spawn(move || {
            let mut f = std::fs::File::open(&notif_path_clone).unwrap();
            let mut buf = Vec::new();
            f.read_to_end(&mut buf).unwrap();
            buf
        });

        dispatch(&subs, Event::Write { key: "x".to_string(), value: "42".to_string() });

        let buf = reader.join().unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let record = NotifyRecord::read(&mut cursor).unwrap();
        assert_eq!(record.opcode, NotifyOpcode::Write);
        assert_eq!(record.key, "x");
        assert_eq!(record.value, "42");
        assert_eq!(subs.snapshot_subscribers("x").len(), 1);
    }

    #[test]
    fn broken_channel_removes_subscriber() {
        let subs = SubscriptionTable::new();
        subs.subscribe("x", Subscriber { client_id: "c1".into(), notif_path: "/nonexistent/path".into() });
        dispatch(&subs, Event::Write { key: "x".to_string(), value: "1".to_string() });
        assert!(subs.snapshot_subscribers("x").is_empty());
    }

    #[test]
    fn delete_event_prunes_row_after_dispatch() {
        let subs = SubscriptionTable::new();
        subs.subscribe("x", Subscriber { client_id: "c1".into(), notif_path: "/nonexistent/path".into() });
        dispatch(&subs, Event::Delete { key: "x".to_string() });
        assert!(subs.snapshot_subscribers("x").is_empty());
    }
}
