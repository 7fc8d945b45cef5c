//! Background job table and the monitor that follows detached jobs.
//!
//! Jobs are launched detached (see [`crate::background`]) with their output
//! redirected to files. The registry remembers where each job writes, and a
//! monitor task periodically calls [`BackgroundJobRegistry::refresh`] to
//! stream new output and to notice when a job's process is gone.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::process_group::{self, ProcessState};
use crate::style::style;

/// Default period between monitor refreshes.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(1000);

/// One detached job. Jobs are never removed during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    pub id: u32,
    pub pid: u32,
    pub command: String,
    pub running: bool,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub stdout_offset: u64,
    pub stderr_offset: u64,
    pub notified_completion: bool,
    pub stream_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Something the monitor has to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobNotice {
    /// New output since the last refresh. `first` marks the job's first output.
    Output {
        id: u32,
        stream: OutputStream,
        text: String,
        first: bool,
    },
    /// The job's process is gone. `trailing` holds output not yet shown;
    /// `first` is set when that output is the first the job produced.
    Completed {
        id: u32,
        command: String,
        trailing: Vec<(OutputStream, String)>,
        first: bool,
    },
}

impl JobNotice {
    /// Print the notice the way the shell shows job activity.
    pub fn print(&self) {
        match self {
            JobNotice::Output {
                id,
                stream,
                text,
                first,
            } => {
                if *first {
                    println!("{}", style(format!("\n[{id}] output:")).blue());
                }
                print_job_output(*stream, text);
            }
            JobNotice::Completed {
                id,
                command,
                trailing,
                first,
            } => {
                if *first {
                    println!("{}", style(format!("\n[{id}] output:")).blue());
                }
                for (stream, text) in trailing {
                    print_job_output(*stream, text);
                }
                println!("{}", style(format!("\n[{id}] Done: {command}")).green());
            }
        }
    }
}

fn print_job_output(stream: OutputStream, text: &str) {
    let text = text.trim_end_matches('\n');
    match stream {
        OutputStream::Stdout => println!("{text}"),
        OutputStream::Stderr => eprintln!("{}", style(text).red().for_stderr()),
    }
}

/// Result of asking to bring a job to the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForegroundReport {
    NoJobs,
    NoRunningJobs,
    NoSuchJob(u32),
    /// The job had already finished.
    Completed(BackgroundJob),
    /// The process disappeared; the job has now been marked finished.
    Vanished(BackgroundJob),
    Running(BackgroundJob),
}

/// Liveness lookup used by the registry.
pub trait ProcessProbe: Send + Sync {
    fn state(&self, pid: u32) -> ProcessState;
}

/// Probe backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn state(&self, pid: u32) -> ProcessState {
        process_group::process_state(pid)
    }
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: BTreeMap<u32, BackgroundJob>,
    next_id: u32,
}

struct RegistryInner {
    table: Mutex<JobTable>,
    refresh_lock: Mutex<()>,
    monitor_started: AtomicBool,
    auto_monitor: bool,
    poll_interval: Duration,
    probe: Arc<dyn ProcessProbe>,
}

/// Cloneable handle to the session's job table.
#[derive(Clone)]
pub struct BackgroundJobRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for BackgroundJobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundJobRegistry")
            .field("jobs", &self.inner.table.lock().jobs.len())
            .field("poll_interval", &self.inner.poll_interval)
            .finish()
    }
}

impl Default for BackgroundJobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MONITOR_INTERVAL)
    }
}

impl BackgroundJobRegistry {
    /// Registry whose monitor starts with the first registered job.
    pub fn new(poll_interval: Duration) -> Self {
        Self::build(poll_interval, Arc::new(SystemProbe), true)
    }

    pub fn with_probe(poll_interval: Duration, probe: Arc<dyn ProcessProbe>) -> Self {
        Self::build(poll_interval, probe, true)
    }

    /// Registry that never starts a monitor; callers drive [`Self::refresh`].
    pub fn manual(probe: Arc<dyn ProcessProbe>) -> Self {
        Self::build(DEFAULT_MONITOR_INTERVAL, probe, false)
    }

    fn build(poll_interval: Duration, probe: Arc<dyn ProcessProbe>, auto_monitor: bool) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(JobTable {
                    jobs: BTreeMap::new(),
                    next_id: 1,
                }),
                refresh_lock: Mutex::new(()),
                monitor_started: AtomicBool::new(false),
                auto_monitor,
                poll_interval,
                probe,
            }),
        }
    }

    /// Record a new job and make sure the monitor is running.
    pub fn register(
        &self,
        pid: u32,
        command: impl Into<String>,
        stdout_path: PathBuf,
        stderr_path: PathBuf,
    ) -> u32 {
        let command = command.into();
        let id = {
            let mut table = self.inner.table.lock();
            let id = table.next_id;
            table.next_id += 1;
            table.jobs.insert(
                id,
                BackgroundJob {
                    id,
                    pid,
                    command: command.clone(),
                    running: true,
                    stdout_path,
                    stderr_path,
                    stdout_offset: 0,
                    stderr_offset: 0,
                    notified_completion: false,
                    stream_started: false,
                },
            );
            id
        };
        debug!(id, pid, %command, "registered background job");

        if self.inner.auto_monitor {
            self.start_monitor();
        }
        id
    }

    /// Start the monitor loop once. Without a tokio runtime nothing starts and
    /// a later call may try again.
    pub fn start_monitor(&self) -> bool {
        if self
            .inner
            .monitor_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no tokio runtime, job monitor not started");
            self.inner.monitor_started.store(false, Ordering::Release);
            return false;
        };

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.poll_interval;
        handle.spawn(monitor_loop(weak, interval));
        debug!(?interval, "job monitor started");
        true
    }

    pub fn monitor_running(&self) -> bool {
        self.inner.monitor_started.load(Ordering::Acquire)
    }

    /// One monitor step over all running jobs.
    ///
    /// Refreshes are serialized. The job table is locked only to snapshot and
    /// to apply updates, never across file reads or process lookups.
    pub fn refresh(&self) -> Vec<JobNotice> {
        let _serial = self.inner.refresh_lock.lock();

        let snapshot: Vec<BackgroundJob> = {
            let table = self.inner.table.lock();
            table.jobs.values().filter(|job| job.running).cloned().collect()
        };

        let mut notices = Vec::new();
        for job in snapshot {
            // Probe first so output written just before exit is still read.
            let state = self.inner.probe.state(job.pid);
            let stdout = read_delta(&job.stdout_path, job.stdout_offset);
            let stderr = read_delta(&job.stderr_path, job.stderr_offset);

            let mut table = self.inner.table.lock();
            let Some(current) = table.jobs.get_mut(&job.id) else {
                continue;
            };
            if !current.running {
                continue;
            }
            current.stdout_offset = current.stdout_offset.max(stdout.offset);
            current.stderr_offset = current.stderr_offset.max(stderr.offset);

            let deltas = [
                (OutputStream::Stdout, stdout.text),
                (OutputStream::Stderr, stderr.text),
            ];

            if state.is_terminal() {
                let trailing: Vec<_> = deltas
                    .into_iter()
                    .filter(|(_, text)| !text.is_empty())
                    .collect();
                let first = !current.stream_started && !trailing.is_empty();
                current.stream_started |= first;
                current.running = false;
                current.notified_completion = true;
                debug!(id = job.id, pid = job.pid, ?state, "background job finished");
                notices.push(JobNotice::Completed {
                    id: job.id,
                    command: current.command.clone(),
                    trailing,
                    first,
                });
            } else {
                for (stream, text) in deltas {
                    if text.is_empty() {
                        continue;
                    }
                    let first = !current.stream_started;
                    current.stream_started = true;
                    notices.push(JobNotice::Output {
                        id: job.id,
                        stream,
                        text,
                        first,
                    });
                }
            }
        }
        notices
    }

    /// All jobs, sorted by id.
    pub fn list(&self) -> Vec<BackgroundJob> {
        self.inner.table.lock().jobs.values().cloned().collect()
    }

    pub fn get(&self, id: u32) -> Option<BackgroundJob> {
        self.inner.table.lock().jobs.get(&id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table.lock().jobs.is_empty()
    }

    /// Resolve the job `fg` refers to. `None` picks the highest running id.
    pub fn foreground(&self, id: Option<u32>) -> ForegroundReport {
        let job = {
            let table = self.inner.table.lock();
            if table.jobs.is_empty() {
                return ForegroundReport::NoJobs;
            }
            let job = match id {
                Some(id) => table.jobs.get(&id),
                None => table.jobs.values().rev().find(|job| job.running),
            };
            match (job, id) {
                (Some(job), _) => job.clone(),
                (None, Some(id)) => return ForegroundReport::NoSuchJob(id),
                (None, None) => return ForegroundReport::NoRunningJobs,
            }
        };

        if !job.running {
            return ForegroundReport::Completed(job);
        }

        if self.inner.probe.state(job.pid).is_terminal() {
            self.mark_finished(job.id);
            let finished = self.get(job.id).unwrap_or(job);
            return ForegroundReport::Vanished(finished);
        }
        ForegroundReport::Running(job)
    }

    /// Mark a job finished without a completion notice. Returns false when the
    /// job is unknown or already finished.
    pub fn mark_finished(&self, id: u32) -> bool {
        let mut table = self.inner.table.lock();
        match table.jobs.get_mut(&id) {
            Some(job) if job.running => {
                job.running = false;
                job.notified_completion = true;
                debug!(id, "background job marked finished");
                true
            }
            _ => false,
        }
    }
}

async fn monitor_loop(inner: Weak<RegistryInner>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(inner) = inner.upgrade() else {
            debug!("job registry dropped, monitor exiting");
            break;
        };
        let registry = BackgroundJobRegistry { inner };
        for notice in registry.refresh() {
            notice.print();
        }
    }
}

struct Delta {
    text: String,
    offset: u64,
}

/// Read `path` from `offset` to its current size.
fn read_delta(path: &Path, offset: u64) -> Delta {
    match try_read_delta(path, offset) {
        Ok(delta) => delta,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to read job output");
            }
            Delta {
                text: String::new(),
                offset,
            }
        }
    }
}

fn try_read_delta(path: &Path, offset: u64) -> io::Result<Delta> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size <= offset {
        return Ok(Delta {
            text: String::new(),
            offset,
        });
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.take(size - offset).read_to_end(&mut bytes)?;
    Ok(Delta {
        text: String::from_utf8_lossy(&bytes).into_owned(),
        offset: offset + bytes.len() as u64,
    })
}
