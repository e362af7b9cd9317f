use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::snapshot::SubtitleRow;
use crate::time::{format_srt_time, parse_srt_time};

const TIMING_SEPARATOR: &str = "-->";

/// Parses SRT text into rows.
///
/// Cues are separated by blank lines; multi-line cue text is joined with
/// `\n`. CRLF line endings and a leading byte order mark are accepted.
///
/// # Example
/// ```
/// use align_engine::srt::parse_srt;
///
/// let rows = parse_srt("1\n00:00:01,000 --> 00:00:02,500\nHello\n").expect("valid srt");
/// assert_eq!(rows[0].start_ms, 1_000);
/// assert_eq!(rows[0].text, "Hello");
/// ```
pub fn parse_srt(source: &str) -> Result<Vec<SubtitleRow>> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source.lines().enumerate().map(|(at, line)| (at + 1, line));
    let mut rows = Vec::new();

    while let Some((line_no, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let index = line.parse::<u32>().map_err(|_| EngineError::MalformedSrt {
            line: line_no,
            reason: "expected cue index",
        })?;

        let (timing_no, timing) = lines.next().ok_or(EngineError::MalformedSrt {
            line: line_no + 1,
            reason: "missing cue timing",
        })?;
        let (start_ms, end_ms) = parse_timing(timing).ok_or(EngineError::MalformedSrt {
            line: timing_no,
            reason: "invalid cue timing",
        })?;
        if end_ms < start_ms {
            return Err(EngineError::MalformedSrt {
                line: timing_no,
                reason: "cue ends before it starts",
            });
        }

        let mut text = Vec::new();
        for (_, line) in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            text.push(line.trim_end());
        }

        rows.push(SubtitleRow::new(index, start_ms, end_ms, text.join("\n")));
    }

    debug!(rows = rows.len(), "srt parsed");
    Ok(rows)
}

fn parse_timing(line: &str) -> Option<(i64, i64)> {
    let (start, rest) = line.split_once(TIMING_SEPARATOR)?;
    // Cue settings may follow the end timestamp.
    let end = rest.split_whitespace().next()?;
    Some((parse_srt_time(start).ok()?, parse_srt_time(end).ok()?))
}

/// Renders rows as SRT with sequential indices starting at 1.
///
/// Rows flagged to use the reference text are written with it.
pub fn write_srt(rows: &[Arc<SubtitleRow>]) -> String {
    let mut out = String::new();
    for (position, row) in rows.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            position + 1,
            format_srt_time(row.start_ms),
            format_srt_time(row.end_ms),
            row.effective_text()
        ));
    }
    out
}
