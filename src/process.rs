//! Subprocess plumbing for the external tools the pipeline shells out to
//! (ffmpeg, ffprobe, the python adapter scripts).

use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{RdError, RdResult};

/// How often a timed run checks the child for exit or deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for a reader thread to hand over its buffer once the
/// child is gone. Readers finish as the pipe closes, so this only bites when
/// a kill raced the final read.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(100);

#[must_use]
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

pub fn run_command(program: &str, args: &[String], cwd: Option<&Path>) -> RdResult<Output> {
    run_command_with_timeout(program, args, cwd, None)
}

/// Run a subprocess to completion, capturing stdout and stderr. With a
/// timeout, the child is polled and killed once the deadline passes; the
/// stderr collected so far rides along in the timeout error. A non-zero exit
/// becomes `RdError::CommandFailed` with the trimmed stderr appended.
pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> RdResult<Output> {
    if !command_exists(program) {
        return Err(RdError::CommandMissing {
            command: program.to_owned(),
        });
    }

    let rendered = render_invocation(program, args);
    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let Some(limit) = timeout else {
        return check_exit(&rendered, command.output()?);
    };

    let mut child = command.spawn()?;
    let stdout_rx = drain_pipe(child.stdout.take());
    let stderr_rx = drain_pipe(child.stderr.take());
    let deadline = Instant::now() + limit;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            let stderr = String::from_utf8_lossy(&collect_buffer(&stderr_rx)).into_owned();
            return Err(RdError::from_command_timeout(
                rendered,
                saturating_duration_ms(limit),
                stderr,
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    check_exit(
        &rendered,
        Output {
            status,
            stdout: collect_buffer(&stdout_rx),
            stderr: collect_buffer(&stderr_rx),
        },
    )
}

fn render_invocation(program: &str, args: &[String]) -> String {
    format!("{} {}", program, args.join(" "))
}

/// Move a child pipe onto its own reader thread; the full buffer arrives on
/// the returned channel when the pipe closes. A `None` pipe yields a channel
/// that never sends.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = tx.send(buffer);
        });
    }
    rx
}

fn collect_buffer(rx: &Receiver<Vec<u8>>) -> Vec<u8> {
    rx.recv_timeout(PIPE_DRAIN_GRACE).unwrap_or_default()
}

fn check_exit(rendered: &str, output: Output) -> RdResult<Output> {
    if output.status.success() {
        return Ok(output);
    }

    // Signal-terminated children carry no exit code; -1 marks that case.
    let status = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Err(RdError::from_command_failure(
        rendered.to_owned(),
        status,
        stderr,
    ))
}

fn saturating_duration_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::time::Duration;

    use super::*;

    fn exited(code: i32, stderr: &str) -> Output {
        Output {
            // raw wait status: exit code lives in the upper byte
            status: ExitStatus::from_raw(code << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn zero_exit_passes_through() {
        let output = run_command("true", &[], None).expect("true exits zero");
        assert!(output.status.success());
    }

    #[test]
    fn absent_program_is_command_missing() {
        let err = run_command("redub_no_such_binary_40912", &[], None)
            .expect_err("unknown program");
        assert!(matches!(err, RdError::CommandMissing { .. }), "got: {err:?}");
    }

    #[test]
    fn nonzero_exit_carries_stderr_text() {
        let err = run_command("ls", &["/redub_no_such_path_40912".to_owned()], None)
            .expect_err("ls on a missing path");
        let text = err.to_string();
        assert!(
            text.contains("redub_no_such_path") || text.contains("No such file"),
            "stderr missing from: {text}"
        );
    }

    #[test]
    fn deadline_kills_a_stuck_child() {
        let err = run_command_with_timeout(
            "sleep",
            &["60".to_owned()],
            None,
            Some(Duration::from_millis(100)),
        )
        .expect_err("sleep should be killed");
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }

    #[test]
    fn no_timeout_means_plain_wait() {
        let output =
            run_command_with_timeout("true", &[], None, None).expect("plain wait path");
        assert!(output.status.success());
    }

    #[test]
    fn cwd_is_applied_to_the_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run_command("pwd", &[], Some(dir.path())).expect("pwd");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains(dir.path().to_str().unwrap()), "got: {stdout}");
    }

    #[test]
    fn check_exit_keeps_the_exit_code() {
        let err = check_exit("tool --flag", exited(42, "boom")).expect_err("non-zero");
        let text = err.to_string();
        assert!(text.contains("42") && text.contains("boom"), "got: {text}");
    }

    #[test]
    fn check_exit_accepts_success() {
        assert!(check_exit("tool", exited(0, "")).is_ok());
    }

    #[test]
    fn signal_termination_maps_to_minus_one() {
        let output = Output {
            status: ExitStatus::from_raw(9), // SIGKILL, no exit code
            stdout: Vec::new(),
            stderr: b"killed".to_vec(),
        };
        let err = check_exit("tool", output).expect_err("signaled");
        assert!(err.to_string().contains("-1"), "got: {err}");
    }

    #[test]
    fn drain_pipe_without_a_pipe_never_sends() {
        let rx = drain_pipe::<std::io::Empty>(None);
        assert!(collect_buffer(&rx).is_empty());
    }

    #[test]
    fn command_exists_matches_path_lookup() {
        assert!(command_exists("ls"));
        assert!(!command_exists("redub_no_such_binary_40912"));
    }

    #[test]
    fn millis_conversion_saturates() {
        assert_eq!(saturating_duration_ms(Duration::from_secs(5)), 5000);
        assert_eq!(
            saturating_duration_ms(Duration::from_secs(u64::MAX)),
            u64::MAX
        );
    }
}
