use std::io::{IsTerminal, Write};
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::load::{ProgressReceiver, RunProgress};

const PROGRESS_TICK: Duration = Duration::from_millis(250);
const BAR_WIDTH: usize = 30;

/// Draws a single progress line on stderr until the run reaches a terminal
/// state. Does nothing when stderr is not a TTY.
pub(crate) fn setup_progress_indicator(
    mut progress_rx: ProgressReceiver,
    no_color: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !std::io::stderr().is_terminal() {
            return;
        }

        let style = ProgressStyle::new(BAR_WIDTH);
        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        loop {
            tokio::select! {
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }
            let snapshot = *progress_rx.borrow();
            if render_progress_line(&style, &snapshot, no_color).is_err() {
                break;
            }
            if snapshot.state.is_terminal() {
                if finish_progress_line().is_err() {
                    break;
                }
                break;
            }
        }
    })
}

fn render_progress_line(
    style: &ProgressStyle,
    snapshot: &RunProgress,
    no_color: bool,
) -> Result<(), std::io::Error> {
    let line = build_progress_line(style, snapshot, no_color);

    let mut out = std::io::stderr();
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    for segment in line {
        if let Some(color) = segment.color {
            queue!(
                out,
                SetForegroundColor(color),
                Print(&segment.text),
                ResetColor
            )?;
        } else {
            queue!(out, Print(&segment.text))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn finish_progress_line() -> Result<(), std::io::Error> {
    let mut out = std::io::stderr();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn build_progress_line(
    style: &ProgressStyle,
    snapshot: &RunProgress,
    no_color: bool,
) -> Vec<ProgressSegment> {
    let size = style.size.max(1);
    let goal = u128::from(snapshot.total_estimate.max(1));
    let current = u128::from(snapshot.completed_count).min(goal);
    let size_u128 = u128::from(u64::try_from(size).unwrap_or(u64::MAX));

    let scaled = current
        .saturating_mul(size_u128)
        .checked_div(goal)
        .unwrap_or(0);
    let complete_size = usize::try_from(scaled).unwrap_or(size).min(size);
    let incomplete_size = size.saturating_sub(complete_size);

    let percent_x100 = current
        .saturating_mul(10_000)
        .checked_div(goal)
        .unwrap_or(0);
    let percent_text = format!(
        " {}.{:02}%",
        percent_x100.checked_div(100).unwrap_or(0),
        percent_x100.checked_rem(100).unwrap_or(0)
    );

    let elapsed_tenths = snapshot.elapsed_ms.checked_div(100).unwrap_or(0);
    let detail_text = format!(
        " | {}/{} req | {} VUs | {}.{}s",
        snapshot.completed_count,
        snapshot.total_estimate,
        snapshot.active_vus,
        elapsed_tenths.checked_div(10).unwrap_or(0),
        elapsed_tenths.checked_rem(10).unwrap_or(0)
    );
    let state_text = format!(" [{}]", snapshot.state.as_str());

    let progress_bar = format!(
        "{}{}{}{}",
        style.begin,
        style.fill.repeat(complete_size),
        style.empty.repeat(incomplete_size),
        style.end
    );

    if no_color {
        vec![
            ProgressSegment::plain(progress_bar),
            ProgressSegment::plain(percent_text),
            ProgressSegment::plain(detail_text),
            ProgressSegment::plain(state_text),
        ]
    } else {
        vec![
            ProgressSegment::plain(progress_bar),
            ProgressSegment::colored(percent_text, Color::Cyan),
            ProgressSegment::colored(detail_text, Color::Yellow),
            ProgressSegment::colored(state_text, Color::Green),
        ]
    }
}

struct ProgressStyle {
    size: usize,
    begin: String,
    end: String,
    fill: String,
    empty: String,
}

impl ProgressStyle {
    fn new(size: usize) -> Self {
        Self {
            size,
            begin: "[".to_owned(),
            end: "]".to_owned(),
            fill: "#".to_owned(),
            empty: "-".to_owned(),
        }
    }
}

struct ProgressSegment {
    text: String,
    color: Option<Color>,
}

impl ProgressSegment {
    const fn plain(text: String) -> Self {
        Self { text, color: None }
    }

    const fn colored(text: String, color: Color) -> Self {
        Self {
            text,
            color: Some(color),
        }
    }
}

#[cfg(test)]
pub(super) fn progress_text(snapshot: &RunProgress) -> String {
    build_progress_line(&ProgressStyle::new(10), snapshot, true)
        .into_iter()
        .map(|segment| segment.text)
        .collect()
}
