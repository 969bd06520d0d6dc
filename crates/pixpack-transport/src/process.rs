use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource};

/// Terminates a spawned codec process from any thread.
///
/// Cloneable so a cancellation path can hold one while a pipeline worker owns
/// the sink or source itself. Triggering after the process has been reaped
/// is a no-op.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    pid: u32,
    reaped: Arc<Mutex<bool>>,
}

impl KillSwitch {
    /// Ask the codec process to terminate.
    pub fn trigger(&self) {
        // Held while signalling: the child is only reaped under this lock.
        let reaped = lock(&self.reaped);
        if *reaped {
            return;
        }
        debug!(pid = self.pid, "terminating codec process");

        #[cfg(unix)]
        {
            // SAFETY: `kill` has no memory-safety preconditions; the pid belongs to a
            // child of this process that cannot be reaped while `reaped` is locked,
            // so it cannot have been recycled for an unrelated process.
            let rc = unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!(
                    pid = self.pid,
                    error = %std::io::Error::last_os_error(),
                    "failed to signal codec process"
                );
            }
        }
    }

    /// Process id of the codec.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

fn lock(reaped: &Mutex<bool>) -> MutexGuard<'_, bool> {
    reaped.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Block until `pid` has exited, leaving it unreaped.
#[cfg(unix)]
fn wait_exited(pid: u32) -> std::io::Result<()> {
    loop {
        // SAFETY: `siginfo_t` is plain data and zero is a valid bit pattern; waitid
        // only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid, exclusively borrowed siginfo_t for the call.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            // Already reaped; `Child::wait` returns the cached status.
            Some(libc::ECHILD) => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// A spawned codec child and its reap state.
struct CodecProcess {
    program: String,
    child: Child,
    reaped: Arc<Mutex<bool>>,
}

impl CodecProcess {
    fn spawn(command: &mut Command) -> Result<Self> {
        let program = command.get_program().to_string_lossy().into_owned();
        let child = command.spawn().map_err(|source| TransportError::Launch {
            program: program.clone(),
            source,
        })?;
        info!(%program, pid = child.id(), "started codec process");
        Ok(Self {
            program,
            child,
            reaped: Arc::new(Mutex::new(false)),
        })
    }

    fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            pid: self.child.id(),
            reaped: Arc::clone(&self.reaped),
        }
    }

    fn missing_pipe(&self, which: &str) -> TransportError {
        TransportError::Launch {
            program: self.program.clone(),
            source: std::io::Error::other(format!("{which} was not captured")),
        }
    }

    /// Wait for exit, then reap under the lock a [`KillSwitch`] signals under.
    fn reap(&mut self) -> std::io::Result<ExitStatus> {
        #[cfg(unix)]
        wait_exited(self.child.id())?;
        let mut reaped = lock(&self.reaped);
        let status = self.child.wait()?;
        *reaped = true;
        Ok(status)
    }

    fn wait(&mut self) -> Result<()> {
        let status = self.reap()?;
        debug!(program = %self.program, %status, "codec process exited");
        if status.success() {
            Ok(())
        } else {
            Err(TransportError::Exited {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }

    fn kill(&mut self) {
        {
            let reaped = lock(&self.reaped);
            if *reaped {
                return;
            }
            if let Err(err) = self.child.kill() {
                debug!(program = %self.program, error = %err, "codec kill failed");
            }
        }
        if let Err(err) = self.reap() {
            debug!(program = %self.program, error = %err, "codec reap failed");
        }
    }
}

impl Drop for CodecProcess {
    fn drop(&mut self) {
        let mut reaped = lock(&self.reaped);
        if *reaped {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(_)) => *reaped = true,
            _ => {
                drop(reaped);
                warn!(program = %self.program, "codec process still running on drop, killing");
                self.kill();
            }
        }
    }
}

/// Feeds frames into a codec process through its stdin.
pub struct ProcessSink {
    process: CodecProcess,
    stdin: Option<ChildStdin>,
}

impl ProcessSink {
    /// Spawn `command` with a piped stdin.
    ///
    /// Stdout and stderr dispositions are left to the caller.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command.stdin(Stdio::piped());
        let mut process = CodecProcess::spawn(&mut command)?;
        let stdin = match process.child.stdin.take() {
            Some(stdin) => stdin,
            None => return Err(process.missing_pipe("stdin")),
        };
        Ok(Self {
            process,
            stdin: Some(stdin),
        })
    }

    /// Handle that can terminate the codec from another thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.process.kill_switch()
    }
}

impl FrameSink for ProcessSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(chunk)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        self.process.wait()
    }

    fn abort(&mut self) {
        self.stdin.take();
        self.process.kill();
    }
}

impl std::fmt::Debug for ProcessSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSink")
            .field("program", &self.process.program)
            .field("pid", &self.process.child.id())
            .finish()
    }
}

/// Pulls frames out of a codec process through its stdout.
pub struct ProcessSource {
    process: CodecProcess,
    stdout: Option<ChildStdout>,
}

impl ProcessSource {
    /// Spawn `command` with a piped stdout.
    ///
    /// Stdin and stderr dispositions are left to the caller.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command.stdout(Stdio::piped());
        let mut process = CodecProcess::spawn(&mut command)?;
        let stdout = match process.child.stdout.take() {
            Some(stdout) => stdout,
            None => return Err(process.missing_pipe("stdout")),
        };
        Ok(Self {
            process,
            stdout: Some(stdout),
        })
    }

    /// Handle that can terminate the codec from another thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.process.kill_switch()
    }
}

impl FrameSource for ProcessSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stdout = self.stdout.as_mut().ok_or(TransportError::Closed)?;
        loop {
            match stdout.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.stdout.take();
        self.process.wait()
    }

    fn abort(&mut self) {
        self.stdout.take();
        self.process.kill();
    }
}

impl std::fmt::Debug for ProcessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSource")
            .field("program", &self.process.program)
            .field("pid", &self.process.child.id())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn sink_streams_into_child_and_reports_success() {
        let mut sink = ProcessSink::spawn(shell("cat > /dev/null")).unwrap();
        sink.write_chunk(&[7u8; 4096]).unwrap();
        sink.write_chunk(&[9u8; 4096]).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn sink_reports_nonzero_exit() {
        let mut sink = ProcessSink::spawn(shell("cat > /dev/null; exit 3")).unwrap();
        sink.write_chunk(b"abc").unwrap();
        let err = sink.finish().unwrap_err();
        assert!(matches!(err, TransportError::Exited { code: Some(3), .. }));
    }

    #[test]
    fn write_after_finish_is_closed() {
        let mut sink = ProcessSink::spawn(shell("cat > /dev/null")).unwrap();
        sink.finish().unwrap();
        let err = sink.write_chunk(b"late").unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn launch_failure_names_program() {
        let err = ProcessSink::spawn(Command::new("/nonexistent/pixpack-codec")).unwrap_err();
        match err {
            TransportError::Launch { program, .. } => {
                assert_eq!(program, "/nonexistent/pixpack-codec")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn source_reads_child_stdout_until_eof() {
        let mut source = ProcessSource::spawn(shell("printf 'abcdef'")).unwrap();
        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = source.read_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        source.finish().unwrap();
        assert_eq!(collected, b"abcdef");
    }

    #[test]
    fn source_nonzero_exit_surfaces_after_stream() {
        let mut source = ProcessSource::spawn(shell("printf 'x'; exit 1")).unwrap();
        let mut buf = [0u8; 8];
        while source.read_chunk(&mut buf).unwrap() > 0 {}
        let err = source.finish().unwrap_err();
        assert!(matches!(err, TransportError::Exited { code: Some(1), .. }));
    }

    #[test]
    fn kill_switch_terminates_blocked_child() {
        let mut source = ProcessSource::spawn(shell("exec sleep 30")).unwrap();
        let switch = source.kill_switch();
        let killer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            switch.trigger();
        });
        let mut buf = [0u8; 8];
        assert_eq!(source.read_chunk(&mut buf).unwrap(), 0);
        killer.join().unwrap();
        assert!(source.finish().is_err());
    }

    #[test]
    fn kill_switch_racing_reap_never_outlives_it() {
        let mut sink = ProcessSink::spawn(shell("cat > /dev/null")).unwrap();
        let switch = sink.kill_switch();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let hammer = {
            let switch = switch.clone();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(std::sync::atomic::Ordering::SeqCst) {
                    switch.trigger();
                }
            })
        };

        // Either a clean exit or a signal exit, depending on who won.
        let _ = sink.finish();
        done.store(true, std::sync::atomic::Ordering::SeqCst);
        hammer.join().unwrap();
        assert!(*lock(&switch.reaped));
    }

    #[test]
    fn kill_switch_after_reap_is_noop() {
        let mut sink = ProcessSink::spawn(shell("cat > /dev/null")).unwrap();
        let switch = sink.kill_switch();
        sink.finish().unwrap();
        switch.trigger();
    }
}
