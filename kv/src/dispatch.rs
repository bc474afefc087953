//! The file-job worker pool: a directory-iterator mutex shared by a fixed
//! number of worker threads, each running one `.job` file to completion.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::job::{self, Command};
use crate::kvs::Server;

/// One parsed job file: its commands and the basename used to derive its
/// `.out` and `.bck` file names.
pub struct Job {
    pub basename: String,
    pub commands: Vec<Command>,
}

/// Runs `min(max_threads, jobs.len())` worker threads, each popping the next
/// `Job` from a shared, mutex-protected iterator and running it to
/// completion against `server`. `backup_dir` is where `.bck` files land;
/// `write_output` receives each job's basename and its full output text.
pub fn run_job_pool(
    server: Arc<Server>,
    jobs: Vec<Job>,
    max_threads: usize,
    backup_dir: PathBuf,
    write_output: impl Fn(&str, &str) + Send + Sync + 'static,
) {
    let worker_count = max_threads.max(1).min(jobs.len().max(1));
    let iterator = Arc::new(Mutex::new(jobs.into_iter()));
    let write_output = Arc::new(write_output);

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let server = server.clone();
        let iterator = iterator.clone();
        let backup_dir = backup_dir.clone();
        let write_output = write_output.clone();
        handles.push(thread::spawn(move || {
            block_sigusr1();
            loop {
                let job = {
                    let mut guard = iterator.lock().unwrap();
                    guard.next()
                };
                let Some(job) = job else { break };
                let mut out = Vec::new();
                if let Err(err) = job::run_job(&server, &job.basename, &backup_dir, job.commands.into_iter(), &mut out) {
                    log::error!("job {} failed writing output: {}", job.basename, err);
                    continue;
                }
                write_output(&job.basename, &String::from_utf8_lossy(&out));
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(unix)]
fn block_sigusr1() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGUSR1);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn block_sigusr1() {}

/// Lists `.job` files directly inside `dir`, sorted by file name for
/// deterministic dispatch order across runs.
pub fn discover_job_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "job").unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Command;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn discover_job_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.job"), "").unwrap();
        fs::write(dir.path().join("a.job"), "").unwrap();
        fs::write(dir.path().join("ignore.txt"), "").unwrap();
        let files = discover_job_files(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a.job".to_string(), "b.job".to_string()]);
    }

    #[test]
    fn worker_pool_runs_every_job() {
        let server = Arc::new(Server::init(4).unwrap());
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            Job { basename: "job1".to_string(), commands: vec![Command::Write(vec![("a".into(), "1".into())])] },
            Job { basename: "job2".to_string(), commands: vec![Command::Write(vec![("b".into(), "2".into())])] },
        ];
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        run_job_pool(server.clone(), jobs, 2, dir.path().to_path_buf(), move |basename, _out| {
            seen2.lock().unwrap().push(basename.to_string());
        });
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["job1".to_string(), "job2".to_string()]);
        server.terminate().unwrap();
    }
}
