//! The job executor: the core's contract with the (out-of-scope) textual
//! job-script lexer. This module only knows about already-parsed
//! `Command`s; tokenizing `.job` files into `Command`s is a CLI concern.

use std::io::Write;

use crate::kvs::{DeleteResult, ReadResult, Server};

/// One parsed line of a job script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write(Vec<(String, String)>),
    Read(Vec<String>),
    Delete(Vec<String>),
    Show,
    Wait(u64),
    Backup,
    Help,
    /// Blank line or `#`-comment: skipped, not an error.
    Empty,
    /// A line that did not match the grammar.
    Invalid(String),
}

/// Runs one command against `server`, writing its output (if any) to `out`.
/// Parse errors and per-pair KVS failures are logged and do not abort the
/// job; only an I/O failure on `out` itself is propagated.
pub fn run_command(
    server: &Server,
    command: &Command,
    job_basename: &str,
    backup_count: &mut usize,
    backup_dir: &std::path::Path,
    out: &mut impl Write,
) -> std::io::Result<()> {
    match command {
        Command::Write(pairs) => {
            if let Err(err) = server.write(pairs) {
                log::error!("WRITE failed: {}", err);
            }
        }
        Command::Read(keys) => {
            let mut keys = keys.clone();
            keys.sort();
            let results = match server.read(&keys) {
                Ok(results) => results,
                Err(err) => {
                    log::error!("READ failed: {}", err);
                    return Ok(());
                }
            };
            write!(out, "[")?;
            for result in &results {
                match result {
                    ReadResult::Found(k, v) => write!(out, "({},{})", k, v)?,
                    ReadResult::Missing(k) => write!(out, "({},KVSERROR)", k)?,
                }
            }
            writeln!(out, "]")?;
        }
        Command::Delete(keys) => {
            let results = match server.delete(keys) {
                Ok(results) => results,
                Err(err) => {
                    log::error!("DELETE failed: {}", err);
                    return Ok(());
                }
            };
            let misses: Vec<&str> = results
                .iter()
                .filter_map(|r| match r {
                    DeleteResult::Missing(k) => Some(k.as_str()),
                    DeleteResult::Deleted(_) => None,
                })
                .collect();
            if !misses.is_empty() {
                write!(out, "[")?;
                for k in misses {
                    write!(out, "({},KVSMISSING)", k)?;
                }
                writeln!(out, "]")?;
            }
        }
        Command::Show => match server.show() {
            Ok(pairs) => {
                for (k, v) in pairs {
                    writeln!(out, "({}, {})", k, v)?;
                }
            }
            Err(err) => log::error!("SHOW failed: {}", err),
        },
        Command::Wait(ms) => {
            writeln!(out, "Waiting...")?;
            server.wait(*ms);
        }
        Command::Backup => {
            *backup_count += 1;
            let path = crate::backup::backup_path(backup_dir, job_basename, *backup_count);
            if let Err(err) = server.backup(&path) {
                log::error!("BACKUP failed: {}", err);
            }
        }
        Command::Help => {
            writeln!(
                out,
                "Available commands: WRITE, READ, DELETE, SHOW, WAIT, BACKUP, HELP"
            )?;
        }
        Command::Empty => {}
        Command::Invalid(line) => {
            log::warn!("invalid command: {}", line);
            writeln!(out, "Invalid command")?;
        }
    }
    Ok(())
}

/// Runs every command yielded by `commands` in order, against `server`.
pub fn run_job(
    server: &Server,
    job_basename: &str,
    backup_dir: &std::path::Path,
    commands: impl Iterator<Item = Command>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let mut backup_count = 0usize;
    for command in commands {
        run_command(server, &command, job_basename, &mut backup_count, backup_dir, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_roundtrip_scenario() {
        let server = Server::init(4).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let commands = vec![
            Command::Write(vec![("a".into(), "1".into()), ("b".into(), "2".into())]),
            Command::Read(vec!["a".into(), "b".into(), "c".into()]),
        ];
        let mut out = Vec::new();
        run_job(&server, "job1", dir.path(), commands.into_iter(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[(a,1)(b,2)(c,KVSERROR)]\n");
    }

    #[test]
    fn delete_with_miss_list_scenario() {
        let server = Server::init(4).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let commands =
            vec![Command::Write(vec![("a".into(), "1".into())]), Command::Delete(vec!["a".into(), "b".into()])];
        let mut out = Vec::new();
        run_job(&server, "job1", dir.path(), commands.into_iter(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[(b,KVSMISSING)]\n");
    }

    #[test]
    fn invalid_command_continues() {
        let server = Server::init(4).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let commands = vec![Command::Invalid("GARBAGE".to_string()), Command::Show];
        let mut out = Vec::new();
        run_job(&server, "job1", dir.path(), commands.into_iter(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Invalid command\n");
    }

    #[test]
    fn backup_increments_sequence_number() {
        let server = Server::init(4).unwrap();
        let dir = tempfile::tempdir().unwrap();
        server.write(&[("a".into(), "1".into())]).unwrap();
        let mut out = Vec::new();
        run_job(&server, "job1", dir.path(), vec![Command::Backup, Command::Backup].into_iter(), &mut out).unwrap();
        server.terminate().unwrap();
        assert!(dir.path().join("job1-1.bck").exists());
        assert!(dir.path().join("job1-2.bck").exists());
    }
}
