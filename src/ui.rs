//! Terminal UI — spinners, stage banners, and captured command output.
//!
//! # Design goals
//!
//! - **Clean by default.** While a stage is running the user sees only a spinner and a short label.
//!   Raw tool output is captured and hidden.
//! - **Informative on failure.** A failed stage keeps its captured stdout *and* stderr so the
//!   caller can put them into the error it reports.
//! - **Streaming where it matters.** rsync runs can take a long time; [`run_streaming`] hands every
//!   output line to a callback while the process runs so progress can be shown.
//!
//! # Typical usage
//!
//! ```no_run
//! use crate::ui::run_stage;
//!
//! let outcome = run_stage("Download", &args, None);
//! outcome.print();
//! if outcome.failed() { /* map to a TransferError */ }
//! ```

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    process::{Child, Command, ExitStatus, Output, Stdio},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::{
    progress::{FILES_PER_TICK, ProgressSink},
    runner::redact,
};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames — same style as indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Green ✓  — printed when a stage succeeds.
fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
/// Red ✗    — printed when a stage fails.
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
/// Cyan ✓   — printed next to the final success summary.
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

/// The outcome of a single stage.
///
/// Carries the stage label plus whatever the command wrote to stdout/stderr so
/// it can be attached to the error when something goes wrong.
#[derive(Debug)]
pub struct StageOutcome {
    /// Human-readable stage label, e.g. `"Download"`.
    pub label: String,
    /// Whether the stage completed without error.
    pub success: bool,
    /// Everything the command wrote to stdout.
    pub stdout: String,
    /// Everything the command wrote to stderr.
    pub stderr: String,
    /// Why the stage failed before or while spawning, if it did.
    pub error: Option<String>,
}

impl StageOutcome {
    /// Print the one-line summary (✓/✗ + label) to stdout.
    pub fn print(&self) {
        let icon = if self.success { icon_ok() } else { icon_err() };
        println!("  {}  {}", icon, style(&self.label).bold());
    }

    /// Returns `true` if the stage did not succeed.
    pub const fn failed(&self) -> bool {
        !self.success
    }

    /// stderr and the spawn error, for errors that report stdout separately.
    pub fn error_output(&self) -> String {
        join_non_empty(&[Some(&self.stderr), self.error.as_ref()])
    }

    /// stdout, stderr and the spawn error joined into one block of text.
    pub fn output(&self) -> String {
        join_non_empty(&[Some(&self.stdout), Some(&self.stderr), self.error.as_ref()])
    }
}

fn join_non_empty(parts: &[Option<&String>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|s| s.trim_end())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
///
/// The spinner ticks at ~80 ms and is automatically cleared when
/// [`ProgressBar::finish_and_clear`] is called.
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan}  {msg}")
            .unwrap()
            .tick_chars(SPINNER_CHARS),
    );
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// A spinner that also shows a running file count.
fn make_counter(label: &str) -> ProgressBar {
    let pb = make_spinner(label);
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan}  {msg}  {pos} files")
            .unwrap()
            .tick_chars(SPINNER_CHARS),
    );
    pb
}

// ─── Captured execution ───────────────────────────────────────────────────────

/// Run a command, capturing both stdout and stderr.
///
/// Output is buffered rather than inherited so the spinner can own the
/// terminal while the command runs.  When `stdin` is given, that file is
/// attached as the child's standard input (`mysql < dump.sql` without a
/// shell).
///
/// Returns `(success, stdout_text, stderr_text)`.
pub fn run_captured(args: &[String], stdin: Option<&Path>) -> Result<(bool, String, String)> {
    let (prog, rest) = args.split_first().context("cannot run an empty command")?;
    debug!(cmd = ?redact(args), "spawning");

    let input = match stdin {
        Some(path) => Stdio::from(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Stdio::null(),
    };

    let output: Output = Command::new(prog)
        .args(rest)
        .stdin(input)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to spawn: {prog}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(status = %output.status, "finished {prog}");

    Ok((output.status.success(), stdout, stderr))
}

/// Run a command and hand each line of its stdout to `on_line` as it
/// arrives.  Both `\n` and `\r` end a line, since progress meters redraw
/// with carriage returns.  stderr is drained on a helper thread.
///
/// Returns `(success, stdout_text, stderr_text)`.
pub fn run_streaming(
    args: &[String],
    on_line: &mut dyn FnMut(&str),
) -> Result<(bool, String, String)> {
    let (prog, rest) = args.split_first().context("cannot run an empty command")?;
    debug!(cmd = ?redact(args), "spawning (streaming)");

    let mut child = Command::new(prog)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn: {prog}"))?;

    let mut err_pipe = child.stderr.take().context("child stderr was not captured")?;
    let err_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        err_pipe.read_to_end(&mut buf).map(|_| buf)
    });

    let out_pipe = child.stdout.take().context("child stdout was not captured")?;
    let mut stdout = String::new();
    let mut line: Vec<u8> = Vec::new();
    let mut emit = |line: &mut Vec<u8>, stdout: &mut String| {
        if line.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(line);
        on_line(text.as_ref());
        stdout.push_str(&text);
        stdout.push('\n');
        line.clear();
    };

    let mut read_error = None;
    for byte in BufReader::new(out_pipe).bytes() {
        match byte {
            Ok(b'\n' | b'\r') => emit(&mut line, &mut stdout),
            Ok(b) => line.push(b),
            Err(e) => {
                read_error = Some(e);
                break;
            },
        }
    }
    emit(&mut line, &mut stdout);

    let status = reap(&mut child, prog, read_error.is_some());
    let stderr = match err_reader.join() {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
        Ok(Err(e)) => {
            warn!(error = %e, "could not read stderr of {prog}");
            String::new()
        },
        Err(_) => String::new(),
    };
    if let Some(e) = read_error {
        return Err(e).with_context(|| format!("reading output of {prog}"));
    }
    let status = status?;
    debug!(%status, "finished {prog}");

    Ok((status.success(), stdout, stderr))
}

/// Wait for `child`, killing it first when its output can no longer be read.
fn reap(child: &mut Child, prog: &str, abandon: bool) -> Result<ExitStatus> {
    if abandon {
        if let Err(e) = child.kill() {
            debug!(error = %e, "{prog} already exited");
        }
    }
    child.wait().with_context(|| format!("waiting for {prog}"))
}

// ─── High-level stage runner ──────────────────────────────────────────────────

fn outcome(label: &str, result: Result<(bool, String, String)>) -> StageOutcome {
    match result {
        Ok((success, stdout, stderr)) => StageOutcome {
            label: label.to_string(),
            success,
            stdout,
            stderr,
            error: None,
        },
        Err(e) => StageOutcome {
            label: label.to_string(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(format!("{e:#}")),
        },
    }
}

/// Run a stage behind a spinner, returning a [`StageOutcome`].
///
/// The spinner is cleared before the outcome line is printed, so the terminal
/// always shows a clean, static summary when the stage finishes.
pub fn run_stage(label: &str, args: &[String], stdin: Option<&Path>) -> StageOutcome {
    let spinner = make_spinner(label);
    let result = run_captured(args, stdin);
    spinner.finish_and_clear();
    outcome(label, result)
}

/// Outcome of a stage that runs in-process rather than as a child, such as
/// dump validation.  `error` is `None` on success.
pub fn local_stage(label: &str, error: Option<String>) -> StageOutcome {
    StageOutcome {
        label: label.to_string(),
        success: error.is_none(),
        stdout: String::new(),
        stderr: String::new(),
        error,
    }
}

/// Run an rsync stage, feeding its output to `on_line` while it runs.
pub fn run_streaming_stage(
    label: &str,
    args: &[String],
    on_line: &mut dyn FnMut(&str),
) -> StageOutcome {
    outcome(label, run_streaming(args, on_line))
}

// ─── Progress ticks ───────────────────────────────────────────────────────────

/// [`ProgressSink`] that renders rsync progress as a counting spinner.
pub struct TickBar {
    bar: ProgressBar,
}

impl TickBar {
    pub fn new(label: &str) -> Self {
        Self {
            bar: make_counter(label),
        }
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for TickBar {
    fn tick(&mut self) {
        self.bar.inc(FILES_PER_TICK);
    }

    fn counting_finished(&mut self, found: u64) {
        self.bar.finish_and_clear();
        println!("  Found {found} files/folders");
        self.bar = make_counter("Syncing files");
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// Section heading, e.g. `Fetching database`.
pub fn heading(text: &str) {
    println!("{}", style(text).bold());
}

pub fn note(text: &str) {
    println!("  {}", style(text).dim());
}

/// Print an error (and its cause chain) to stderr.
pub fn print_error(err: &anyhow::Error) {
    eprintln!();
    eprintln!("  {} {:#}", style("Error:").red().bold(), err);
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// Print the final summary after all stages have run.
///
/// Shows a success banner when all stages passed, or a failure banner listing
/// the stages that failed.
pub fn print_summary(outcomes: &[StageOutcome], what: &str) {
    let failed: Vec<&StageOutcome> = outcomes.iter().filter(|o| o.failed()).collect();
    println!();
    if failed.is_empty() {
        println!(
            "  {} {}",
            icon_done(),
            style("All stages completed successfully.").cyan().bold()
        );
    } else {
        eprintln!(
            "  {}  {}",
            icon_err(),
            style(format!("{what} failed.")).red().bold()
        );
        for o in &failed {
            eprintln!("    {} {}", icon_err(), style(&o.label).red());
        }
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────
