//! Bounded execution of the OS discovery commands.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Coarse bound on any discovery subprocess.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Cap on captured output; a full ARP table stays far below this.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

pub(crate) struct Captured {
    pub success: bool,
    pub stdout: String,
}

/// Run `program` with `args` and capture stdout.
///
/// A non-zero exit is not an error here: some tools (notably `ping`) exit
/// non-zero while still printing output the caller must parse. Spawn
/// failures, timeouts, and runaway output are reported as a message for the
/// caller to wrap in its own error variant.
pub(crate) async fn run(program: &str, args: &[&str]) -> std::result::Result<Captured, String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();

    let output = tokio::time::timeout(COMMAND_TIMEOUT, output)
        .await
        .map_err(|_| format!("{program} timed out"))?
        .map_err(|err| format!("cannot run {program}: {err}"))?;

    if output.stdout.len() > MAX_OUTPUT_BYTES {
        return Err(format!("{program} produced more output than expected"));
    }

    Ok(Captured {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}
