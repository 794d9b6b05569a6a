use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::Context;

use crate::audio::read_audio;
use crate::cancel::CancelToken;
use crate::error::{EngineError, Result};
use crate::progress::ProgressSpan;
use crate::types::AudioBuffer;

use super::{Device, SeparationBackend};

/// Overrides the program invoked for separation. Used by the test suite to
/// substitute a scripted stand-in.
pub const DEMUCS_BIN_ENV: &str = "VOXLIFT_DEMUCS_BIN";

/// How long the control loop waits for a line before re-checking the
/// cancellation token.
const IDLE_POLL: Duration = Duration::from_millis(200);

/// Diagnostic lines kept for the error message when the process fails.
const DIAGNOSTIC_TAIL: usize = 12;

fn demucs_program() -> String {
    env::var(DEMUCS_BIN_ENV).unwrap_or_else(|_| "demucs".to_string())
}

/// Out-of-process backend around the `demucs` command-line tool.
///
/// The tool prints progress as percentage markers embedded in free-form
/// text on stderr; a background reader forwards each line while the control
/// loop extracts the percentage and polls for cancellation.
pub struct DemucsCli<'a> {
    model: &'a str,
    device: Device,
}

impl<'a> DemucsCli<'a> {
    pub fn new(model: &'a str, device: Device) -> Self {
        Self { model, device }
    }
}

/// Where demucs leaves the vocal stem: `<root>/<model>/<input-stem>/vocals.wav`.
///
/// The single place this layout is encoded; keep it that way.
pub(crate) fn vocals_artifact_path(output_root: &Path, model: &str, input: &Path) -> PathBuf {
    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    output_root.join(model).join(base).join("vocals.wav")
}

impl SeparationBackend for DemucsCli<'_> {
    fn separate(
        &self,
        input: &Path,
        work_dir: &Path,
        progress: &ProgressSpan<'_>,
        cancel: &CancelToken,
    ) -> Result<AudioBuffer> {
        fs::create_dir_all(work_dir)
            .with_context(|| format!("failed to create work dir: {}", work_dir.display()))?;

        let program = demucs_program();
        let mut child = Command::new(&program)
            .arg("--two-stems=vocals")
            .arg("-n")
            .arg(self.model)
            .arg("-d")
            .arg(self.device.as_demucs_arg())
            .arg("-o")
            .arg(work_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn `{program}`. Is demucs installed?"))?;

        log::info!(
            "separation started: model={}, device={}, input={}",
            self.model,
            self.device.as_demucs_arg(),
            input.display()
        );

        let stderr = child
            .stderr
            .take()
            .context("demucs stderr was not captured")?;

        // The reader owns the blocking reads so the control loop below never
        // blocks longer than the idle poll interval.
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let reader = thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL);
        loop {
            if cancel.is_cancelled() {
                terminate(&mut child);
                // The reader is left to drain on its own: a grandchild of
                // the killed process may still hold the stderr pipe open,
                // and joining here would block on it.
                drop(reader);
                return Err(EngineError::Cancelled);
            }
            match rx.recv_timeout(IDLE_POLL) {
                Ok(line) => {
                    if let Some(percent) = parse_percent(&line) {
                        progress.percent(percent);
                    }
                    progress.raw_line(&line);
                    if tail.len() == DIAGNOSTIC_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }

        let _ = reader.join();
        let status = child.wait().context("failed to wait for demucs")?;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if !status.success() {
            return Err(EngineError::Separation(format!(
                "demucs exited with {status}: {}",
                tail.iter().cloned().collect::<Vec<_>>().join(" | ")
            )));
        }

        let vocals = vocals_artifact_path(work_dir, self.model, input);
        if !vocals.is_file() {
            return Err(EngineError::ArtifactNotFound(vocals));
        }

        read_audio(&vocals)
            .with_context(|| format!("failed to decode separated stem: {}", vocals.display()))
            .map_err(EngineError::from)
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Extracts the first integer directly followed by `%` from a line of
/// free-form diagnostic output, e.g. ` 34%|███       | 12.1/35.6 ...`.
pub(crate) fn parse_percent(line: &str) -> Option<f32> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'%' {
                if let Ok(value) = line[start..i].parse::<f32>() {
                    return Some(value.clamp(0.0, 100.0));
                }
            }
        } else {
            i += 1;
        }
    }
    None
}
