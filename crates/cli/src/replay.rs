use std::fs;
use std::io::Write;

use align_engine::srt::{parse_srt, write_srt};
use align_engine::{
    Command, EditorConfig, EngineErrorEvent, Event, HistoryEntry, Session, SystemClock,
};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::ReplayArgs;

/// Final line printed by `--summary`.
#[derive(Debug, Serialize)]
struct SummaryLine<'a> {
    event: &'static str,
    history: &'a [HistoryEntry],
    undo_count: u64,
}

/// Outcome counts of one replay.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub failed: usize,
}

/// Loads the SRT, applies every scripted command and streams events to `out`.
///
/// Command failures are reported as `error` events and do not stop the
/// replay; unreadable inputs do.
pub fn run(args: &ReplayArgs, out: &mut impl Write) -> Result<ReplayStats> {
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    let source = fs::read_to_string(&args.srt)
        .with_context(|| format!("failed to read srt {}", args.srt.display()))?;
    let rows = parse_srt(&source).with_context(|| format!("failed to parse {}", args.srt.display()))?;

    let script_source = fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let script: Vec<Command> = serde_json::from_str(&script_source)
        .with_context(|| format!("failed to parse script {}", args.script.display()))?;

    let mut session: Session<SystemClock> = Session::new(config);
    let mut stats = ReplayStats::default();

    let mut setup = vec![Command::Load { rows }];
    if let Some(duration_ms) = args.audio_ms {
        setup.push(Command::SetAudioDuration { duration_ms });
    }
    for command in setup {
        emit(out, &session.handle_command(command)?)?;
    }

    for (step, command) in script.into_iter().enumerate() {
        match session.handle_command(command) {
            Ok(events) => {
                stats.applied += 1;
                emit(out, &events)?;
            }
            Err(error) => {
                stats.failed += 1;
                warn!(step, %error, "command rejected");
                emit(out, &[Event::Error(EngineErrorEvent::from_error(&error))])?;
            }
        }
    }

    if let Some(path) = &args.output {
        fs::write(path, write_srt(session.document().rows()))
            .with_context(|| format!("failed to write srt {}", path.display()))?;
    }

    if args.summary {
        let history = session.history().state_history();
        let line = SummaryLine {
            event: "summary",
            history: &history,
            undo_count: session.history().undo_count(),
        };
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }

    info!(
        applied = stats.applied,
        failed = stats.failed,
        rows = session.document().len(),
        "replay finished"
    );
    Ok(stats)
}

fn emit(out: &mut impl Write, events: &[Event]) -> Result<()> {
    for event in events {
        serde_json::to_writer(&mut *out, event)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{ReplayStats, run};
    use crate::ReplayArgs;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:01,000\nhello\n\n2\n00:00:01,500 --> 00:00:02,000\nworld\n";

    fn args(dir: &tempfile::TempDir, script: &str) -> ReplayArgs {
        let srt = dir.path().join("input.srt");
        let script_path = dir.path().join("script.json");
        fs::write(&srt, SRT).expect("srt should be written");
        fs::write(&script_path, script).expect("script should be written");
        ReplayArgs {
            srt,
            script: script_path,
            config: None,
            audio_ms: None,
            output: None,
            summary: false,
        }
    }

    fn lines(out: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|line| serde_json::from_str(line).expect("every line should be json"))
            .collect()
    }

    #[test]
    fn failed_command_becomes_error_line_and_replay_continues() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let args = args(
            &dir,
            r#"[{"command":"toggle_correction","position":0},{"command":"align_end_times"}]"#,
        );
        let mut out: Vec<u8> = Vec::new();

        let stats = run(&args, &mut out).expect("replay should succeed");

        assert_eq!(stats, ReplayStats { applied: 1, failed: 1 });
        let lines = lines(&out);
        let errors: Vec<_> = lines.iter().filter(|line| line["event"] == "error").collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["kind"], "correction_not_found");
    }

    #[test]
    fn output_file_receives_final_document() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut args = args(&dir, r#"[{"command":"combine_rows","positions":[0,1]}]"#);
        let output: PathBuf = dir.path().join("out.srt");
        args.output = Some(output.clone());

        run(&args, &mut Vec::<u8>::new()).expect("replay should succeed");

        let written = fs::read_to_string(&output).expect("output should exist");
        assert_eq!(written, "1\n00:00:00,000 --> 00:00:02,000\nhello world\n\n");
    }

    #[test]
    fn summary_lists_history_entries() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut args = args(&dir, r#"[{"command":"align_end_times"},{"command":"undo"}]"#);
        args.summary = true;
        let mut out: Vec<u8> = Vec::new();

        run(&args, &mut out).expect("replay should succeed");

        let lines = lines(&out);
        let summary = lines.last().expect("summary line should be printed");
        assert_eq!(summary["event"], "summary");
        assert_eq!(summary["undo_count"], 1);
        assert_eq!(summary["history"][1]["operation_type"], "align_end_times");
        assert_eq!(summary["history"][0]["is_current"], true);
    }

    #[test]
    fn huge_row_position_becomes_error_line() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let args = args(
            &dir,
            r#"[{"command":"edit_text","position":18446744073709551615,"text":"x"},{"command":"align_end_times"}]"#,
        );
        let mut out: Vec<u8> = Vec::new();

        let stats = run(&args, &mut out).expect("replay should succeed");

        assert_eq!(stats, ReplayStats { applied: 1, failed: 1 });
        let lines = lines(&out);
        let error = lines
            .iter()
            .find(|line| line["event"] == "error")
            .expect("rejected edit should print an error line");
        assert_eq!(error["kind"], "row_not_found");
    }

    #[test]
    fn malformed_script_is_fatal() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let args = args(&dir, r#"[{"command":"explode"}]"#);

        let error = run(&args, &mut Vec::<u8>::new()).expect_err("replay must fail");

        assert!(error.to_string().starts_with("failed to parse script"));
    }
}
