//! Lifecycle management for git child processes
//!
//! The relocation stage shells out to git between deleting the old store and
//! committing the new one. If the migrator is interrupted while git holds the
//! index lock, an orphaned git process can keep running and leave a stale
//! `index.lock` behind.
//!
//! Each git command therefore runs as the leader of its own process group and
//! is tracked in a registry while it runs. An interrupt stops every tracked
//! group before the migrator exits.

use nix::sys::prctl::set_pdeathsig;
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, setpgid};
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static GIT_CHILDREN: OnceLock<Mutex<ChildRegistry>> = OnceLock::new();

/// Process groups of git commands that are still running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    groups: HashSet<u32>,
    /// Set by the first `terminate_all`; later signals are ignored
    draining: bool,
}

impl ChildRegistry {
    pub fn global() -> &'static Mutex<ChildRegistry> {
        GIT_CHILDREN.get_or_init(|| Mutex::new(ChildRegistry::default()))
    }

    /// Track a child spawned with `in_new_process_group`; its pid is the pgid
    pub fn register(&mut self, pid: u32) {
        self.groups.insert(pid);
        debug!(pid, "Tracking git process");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.groups.remove(&pid);
    }

    pub fn count(&self) -> usize {
        self.groups.len()
    }

    /// SIGTERM every tracked group, then SIGKILL whatever is left after
    /// `grace`. Git commands are short-lived, so the grace period is small.
    pub fn terminate_all(&mut self, grace: Duration) {
        if std::mem::replace(&mut self.draining, true) {
            return;
        }
        let mut remaining: Vec<u32> = self.groups.drain().collect();
        if remaining.is_empty() {
            return;
        }

        info!(count = remaining.len(), "Stopping running git commands");
        remaining.retain(|&pgid| signal_group(pgid, Signal::SIGTERM).is_ok());

        let deadline = Instant::now() + grace;
        while !remaining.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
            remaining.retain(|&pgid| group_exists(pgid));
        }

        for pgid in remaining {
            warn!(pgid, "git did not exit after SIGTERM, killing it");
            let _ = signal_group(pgid, Signal::SIGKILL);
        }
    }
}

fn signal_group(pgid: u32, sig: Signal) -> nix::Result<()> {
    signal::killpg(Pid::from_raw(pgid as i32), sig)
}

/// Any member of the group, zombies included, can still receive signals
fn group_exists(pgid: u32) -> bool {
    signal::killpg(Pid::from_raw(pgid as i32), None).is_ok()
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// On delivery, registered children are terminated and the process exits
/// with `128 + signal`. Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!(signal = sig, "Interrupted, the store may be mid-migration");

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(1));
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Spawning git so an interrupt can reach it and everything it started
pub trait CommandProcessGroup {
    /// Make the child the leader of a new process group and have the kernel
    /// send it SIGTERM if the migrator dies first
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only makes async-signal-safe syscalls
        unsafe {
            self.pre_exec(|| {
                setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(std::io::Error::other)?;
                set_pdeathsig(Signal::SIGTERM).map_err(std::io::Error::other)
            });
        }
        self
    }
}
