use crate::app::{App, AppMode};
use leaven_ipc::TimerStatus;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::time::Duration;

#[derive(Default, Clone, Copy)]
pub struct UiLayout {
    pub countdown: Rect,
}

/// `mm:ss`, or `h:mm:ss` once there is an hour or more left.
pub fn format_time(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

pub fn draw(f: &mut Frame, app: &mut App, delta: Duration) -> UiLayout {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    draw_preset(f, chunks[1], app);
    draw_countdown(f, chunks[2], app);
    draw_stages(f, chunks[3], app);
    draw_banner(f, chunks[4], app);
    draw_status_bar(f, chunks[5], app);

    match app.mode {
        AppMode::SelectingPreset(row) => draw_preset_overlay(f, app, row),
        AppMode::ShowHelp => draw_help_overlay(f, app),
        AppMode::Normal => {}
    }

    let frame_time = tachyonfx::Duration::from_millis(delta.as_millis() as u32);
    app.effect_manager
        .process_effects(frame_time, f.buffer_mut(), area);

    UiLayout {
        countdown: chunks[2],
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "LEAVEN",
            Style::default()
                .fg(theme.yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

fn draw_preset(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let line = match app.selected() {
        Some(preset) => Line::from(vec![
            Span::raw(format!("{} ", preset.emoji)),
            Span::styled(
                preset.name.clone(),
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  {}  {}",
                    app.config.icons.separator,
                    format_time(app.engine.sequence().total_secs())
                ),
                Style::default().fg(theme.gray),
            ),
            Span::styled(
                format!("  {}", preset.description),
                Style::default().fg(theme.gray),
            ),
        ]),
        None => Line::styled("No preset loaded", Style::default().fg(theme.gray)),
    };
    f.render_widget(
        Paragraph::new(line)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::NONE)),
        area,
    );
}

fn status_color(app: &App, status: TimerStatus) -> Color {
    let theme = &app.config.theme;
    match status {
        TimerStatus::Idle => theme.gray,
        TimerStatus::Running => theme.green,
        TimerStatus::Paused => theme.yellow,
        TimerStatus::StageComplete => theme.magenta,
        TimerStatus::AllComplete => theme.cyan,
    }
}

/// The digits turn red for the last minute of a running stage.
fn countdown_color(app: &App) -> Color {
    let theme = &app.config.theme;
    if app.engine.is_running() && app.engine.remaining_secs() <= 60 {
        theme.red
    } else {
        theme.foreground
    }
}

fn draw_countdown(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let snap = app.engine.snapshot();
    let state_icon = match snap.status {
        TimerStatus::Running => &icons.play,
        TimerStatus::Paused => &icons.pause,
        TimerStatus::Idle => &icons.stop,
        TimerStatus::StageComplete | TimerStatus::AllComplete => &icons.stage_done,
    };
    let title = match (snap.current_index, &snap.stage_name) {
        (Some(i), Some(name)) => format!(" Stage {}/{} · {} ", i + 1, snap.stage_count, name),
        _ => " No stages ".to_string(),
    };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(theme.gray)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(status_color(app, snap.status)));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner_area);
    f.render_widget(
        Paragraph::new(format_time(snap.remaining_secs))
            .style(
                Style::default()
                    .fg(countdown_color(app))
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center),
        v_chunks[0],
    );
    f.render_widget(
        Paragraph::new(format!("{} {}", state_icon, snap.status.label()))
            .style(Style::default().fg(status_color(app, snap.status)))
            .alignment(Alignment::Center),
        v_chunks[1],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(theme.yellow).bg(theme.black))
            .label(format!("stage {:>3.0}%", snap.stage_progress * 100.0))
            .ratio(snap.stage_progress.clamp(0.0, 1.0)),
        v_chunks[3],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(theme.blue).bg(theme.black))
            .label(format!("total {:>3.0}%", snap.total_progress * 100.0))
            .ratio(snap.total_progress.clamp(0.0, 1.0)),
        v_chunks[4],
    );
}

fn draw_stages(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let block = Block::default()
        .title(Span::styled(" Stages ", Style::default().fg(theme.gray)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.green));
    let stages = app.engine.sequence().stages();
    if stages.is_empty() {
        f.render_widget(
            Paragraph::new("This preset has no stages.")
                .style(Style::default().fg(theme.gray))
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let current = app.engine.current_index().unwrap_or(0);
    let all_done = app.engine.status() == TimerStatus::AllComplete;
    let items: Vec<ListItem> = stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let done = i < current || (i == current && all_done);
            let (marker, style) = if done {
                (&icons.stage_done, Style::default().fg(theme.gray))
            } else if i == current {
                (
                    &icons.stage_active,
                    Style::default()
                        .fg(theme.foreground)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                (&icons.stage_pending, Style::default().fg(theme.foreground))
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {} ", marker), Style::default().fg(theme.yellow)),
                Span::raw(format!("{} ", stage.emoji)),
                Span::styled(stage.name.clone(), style),
                Span::styled(
                    format!("  {}", format_time(stage.duration_secs)),
                    Style::default().fg(theme.cyan),
                ),
                Span::styled(
                    format!("  {}", stage.description),
                    Style::default().fg(theme.gray),
                ),
            ]))
        })
        .collect();
    let mut state = ListState::default().with_selected(Some(current));
    f.render_stateful_widget(
        List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(theme.black)),
        area,
        &mut state,
    );
}

fn draw_banner(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    if let Some(banner) = app.visible_banner() {
        let color = if banner.is_final { theme.green } else { theme.magenta };
        f.render_widget(
            Paragraph::new(format!("{} {}", app.config.icons.banner, banner.text))
                .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let (mode_text, mode_color) = match app.mode {
        AppMode::Normal => ("NORMAL", theme.green),
        AppMode::SelectingPreset(_) => ("PRESET", theme.magenta),
        AppMode::ShowHelp => ("HELP", theme.blue),
    };
    let help = match app.mode {
        AppMode::Normal => match app.engine.status() {
            TimerStatus::Idle => "space:start │ p:preset │ ?:help │ q:quit",
            TimerStatus::Running => "space:pause │ r:reset stage │ R:reset all │ q:quit",
            TimerStatus::Paused => "space:resume │ r:reset stage │ R:reset all │ q:quit",
            TimerStatus::StageComplete => "space/n:next stage │ r:redo stage │ R:reset all",
            TimerStatus::AllComplete => "space:start over │ p:preset │ q:quit",
        },
        AppMode::SelectingPreset(_) => "j/k:move │ enter:select │ esc:cancel",
        AppMode::ShowHelp => "esc:close",
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", mode_text),
                Style::default()
                    .bg(mode_color)
                    .fg(theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::raw(help),
        ]))
        .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}

fn draw_preset_overlay(f: &mut Frame, app: &App, row: usize) {
    let theme = &app.config.theme;
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);
    let items: Vec<ListItem> = app
        .presets
        .all()
        .map(|p| {
            let marker = if p.id == app.selected_preset {
                app.config.icons.select.as_str()
            } else {
                " "
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", marker), Style::default().fg(theme.selection)),
                Span::raw(format!("{} ", p.emoji)),
                Span::raw(p.name.clone()),
                Span::styled(
                    format!(
                        " ({} stages, {})",
                        p.stages.len(),
                        format_time(p.stages.iter().map(|s| s.duration_secs).sum())
                    ),
                    Style::default().fg(theme.gray),
                ),
                Span::styled(
                    if p.is_custom { " ★" } else { "" },
                    Style::default().fg(theme.yellow),
                ),
            ]))
        })
        .collect();
    let mut state = ListState::default().with_selected(Some(row));
    f.render_stateful_widget(
        List::new(items)
            .block(
                Block::default()
                    .title(" Select Preset ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(theme.magenta))
                    .style(Style::default().bg(theme.background)),
            )
            .highlight_style(Style::default().bg(theme.black).fg(theme.selection)),
        area,
        &mut state,
    );
}

fn draw_help_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(50, 60, f.area());
    f.render_widget(Clear, area);

    let shortcuts = [
        ("space", "Start / pause / resume / next stage"),
        ("n", "Next stage"),
        ("r", "Reset current stage"),
        ("R", "Reset all stages"),
        ("p", "Choose preset"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let lines: Vec<Line> = shortcuts
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{:>7}  ", key), Style::default().fg(theme.blue)),
                Span::raw(*action),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.blue))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notifier::NotifierSet;
    use crate::push::PushClient;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(45 * 60), "45:00");
        assert_eq!(format_time(3600), "1:00:00");
        assert_eq!(format_time(8 * 3600 + 61), "8:01:01");
    }

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| {
            draw(f, app, Duration::from_millis(16));
        })
        .unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_selected_preset_and_countdown() {
        let mut app = App::new(
            Config::default(),
            None,
            NotifierSet::default(),
            PushClient::disabled(),
        );
        let screen = render(&mut app);
        assert!(screen.contains("LEAVEN"));
        assert!(screen.contains("White sandwich bread"));
        assert!(screen.contains("1:00:00"));
        assert!(screen.contains("Bench rest"));
        assert!(screen.contains("space:start"));
    }

    #[test]
    fn last_minute_of_a_running_stage_is_red() {
        let mut app = App::new(
            Config::default(),
            None,
            NotifierSet::default(),
            PushClient::disabled(),
        );
        let mut short = app.presets.get("white-bread").unwrap().clone();
        short.id = "short".into();
        short.stages[0].duration_secs = 60;
        app.save_preset(short).unwrap();
        app.select_preset("short").unwrap();

        let theme = app.config.theme.clone();
        assert_eq!(countdown_color(&app), theme.foreground);
        app.start();
        assert_eq!(countdown_color(&app), theme.red);
        app.pause();
        assert_eq!(countdown_color(&app), theme.foreground);
    }

    #[test]
    fn renders_picker_overlay() {
        let mut app = App::new(
            Config::default(),
            None,
            NotifierSet::default(),
            PushClient::disabled(),
        );
        app.open_preset_picker();
        let screen = render(&mut app);
        assert!(screen.contains("Select Preset"));
        assert!(screen.contains("PRESET"));
    }
}
