//! Ratatui drawing helpers for the progress screen.

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use cursor_installer_core::INSTALLER_VERSION;

use crate::app::{App, ProgressState};
use crate::model::{ActionStep, StepStatus};

pub fn draw(frame: &mut Frame<'_>, app: &App) {
    frame.render_widget(Clear, frame.area());

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, layout[0]);
    draw_status(frame, app, layout[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(layout[2]);

    let steps = render_steps(&app.steps, body[0].width);
    let steps_block = Block::default().title("Steps").borders(Borders::ALL);
    frame.render_widget(steps.block(steps_block), body[0]);

    let logs = render_logs(&app.logs, body[1].width, body[1].height);
    let logs_block = Block::default().title("Logs").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(logs).block(logs_block), body[1]);

    let footer_text = if app.is_running() {
        if app.cancel_requested {
            "Stopping after the current step..."
        } else {
            "Esc / Ctrl+C = cancel"
        }
    } else {
        "Enter / Q = exit"
    };
    let footer = Paragraph::new(footer_text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, layout[3]);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect) {
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "Cursor Installer",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  v{INSTALLER_VERSION}")),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(title, area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let (status_label, status_color) = match &app.progress_state {
        ProgressState::Running => ("In progress", Color::Yellow),
        ProgressState::Completed => ("Completed", Color::Green),
        ProgressState::UpToDate(_) => ("Up to date", Color::Green),
        ProgressState::Failed => ("Failed", Color::Red),
        ProgressState::Cancelled => ("Cancelled", Color::Yellow),
    };

    let mut lines = vec![Line::from(Span::styled(
        format!("{} - {}", app.title, status_label),
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    ))];

    match &app.progress_state {
        ProgressState::Running => {
            if let Some(description) = app.current_description() {
                lines.push(Line::from(description));
            }
        }
        ProgressState::UpToDate(version) => {
            lines.push(Line::from(format!("Installed version {version} is current.")));
        }
        ProgressState::Failed => {
            if let Some(err) = &app.last_error {
                lines.push(Line::from(vec![
                    Span::styled("Error: ", Style::default().fg(Color::Red)),
                    Span::raw(summarize_error(err)),
                ]));
                lines.push(Line::from("See logs for full output."));
            }
        }
        ProgressState::Completed | ProgressState::Cancelled => {}
    }

    let status = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, area);
}

fn render_steps(steps: &[ActionStep], width: u16) -> List<'static> {
    let inner_width = width.saturating_sub(2) as usize;
    let items = steps
        .iter()
        .map(|step| {
            let (symbol, style) = match step.status {
                StepStatus::Pending => ("[ ]", Style::default().fg(Color::Gray)),
                StepStatus::Running => ("[..]", Style::default().fg(Color::Yellow)),
                StepStatus::Done => ("[ok]", Style::default().fg(Color::Green)),
                StepStatus::Failed => ("[!!]", Style::default().fg(Color::Red)),
            };
            let available = inner_width.saturating_sub(symbol.len() + 1);
            let label = truncate_to_width(step.name, available);
            ListItem::new(Line::from(vec![
                Span::styled(symbol, style.add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::raw(label),
            ]))
        })
        .collect::<Vec<_>>();

    List::new(items)
}

/// Wrap log lines to the pane and keep the newest ones that fit.
fn render_logs(logs: &[String], width: u16, height: u16) -> Text<'static> {
    let inner_width = width.saturating_sub(2) as usize;
    let inner_height = height.saturating_sub(2) as usize;
    let mut lines = Vec::new();
    for line in logs {
        for wrapped in wrap_line(line, inner_width) {
            lines.push(truncate_to_width(&wrapped, inner_width));
        }
    }
    let skip = lines.len().saturating_sub(inner_height);
    Text::from(lines.into_iter().skip(skip).map(Line::from).collect::<Vec<_>>())
}

fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let sanitized = line.replace('\t', " ");

    for word in sanitized.split_whitespace() {
        let word_width = word.chars().count();
        if word_width > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.extend(break_long_word(word, width));
            continue;
        }

        let next_len = if current.is_empty() {
            word_width
        } else {
            current.chars().count() + 1 + word_width
        };

        if next_len > width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// Splits by chars so UTF-8 sequences stay intact; wide glyphs may still misalign.
fn break_long_word(word: &str, width: usize) -> Vec<String> {
    let chars = word.chars().collect::<Vec<_>>();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let len = text.chars().count();
    if len <= width {
        return text.to_string();
    }
    if width <= 3 {
        return text.chars().take(width).collect();
    }
    let mut out = text.chars().take(width - 3).collect::<String>();
    out.push_str("...");
    out
}

/// Short status-panel form of an error; the log pane keeps the full text.
fn summarize_error(err: &str) -> String {
    if err.starts_with("permission denied") {
        return "permission denied (see logs)".to_string();
    }
    if err.starts_with("network error") {
        return "download server unreachable (see logs)".to_string();
    }
    if err.contains("without metadata") {
        return "existing install has no metadata; re-run with --force".to_string();
    }

    const MAX_LEN: usize = 72;
    let mut out = err.chars().take(MAX_LEN).collect::<String>();
    if err.chars().count() > MAX_LEN {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_line_breaks_on_words_and_long_tokens() {
        assert_eq!(
            wrap_line("sudo -n mv -f a b", 8),
            vec!["sudo -n", "mv -f a", "b"]
        );
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_line("", 10), vec![""]);
    }

    #[test]
    fn truncate_marks_elided_text() {
        assert_eq!(truncate_to_width("Update Metadata", 10), "Update ...");
        assert_eq!(truncate_to_width("Install", 10), "Install");
        assert_eq!(truncate_to_width("Install", 2), "In");
    }

    #[test]
    fn logs_keep_the_newest_lines() {
        let logs = (0..10).map(|index| format!("line {index}")).collect::<Vec<_>>();
        let text = render_logs(&logs, 20, 5);
        assert_eq!(text.lines.len(), 3);
        assert_eq!(text.lines[2].to_string(), "line 9");
    }

    #[test]
    fn known_errors_get_short_summaries() {
        assert_eq!(
            summarize_error("permission denied: sudo -n mkdir -p /opt/cursor (hint)"),
            "permission denied (see logs)"
        );
        let long = "x".repeat(100);
        assert_eq!(summarize_error(&long).chars().count(), 75);
    }
}
