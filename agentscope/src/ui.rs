//! UI rendering for the TUI.

mod dashboard;
mod onboarding;

use agentscope_core::{DashboardMode, SpanType};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Gauge, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Sparkline, Wrap,
    },
    Frame,
};

use crate::app::{App, InputMode, ViewMode};

// ========== Palette ==========

/// Accent for titles and key hints
const ACCENT: Color = Color::Rgb(0, 255, 255);
/// Gold for spend
const GOLD: Color = Color::Rgb(255, 215, 0);
/// Lime for healthy states
const LIME: Color = Color::Rgb(50, 205, 50);
/// Coral for warnings
const CORAL: Color = Color::Rgb(255, 127, 80);
/// Red for errors
const ALERT: Color = Color::Rgb(235, 80, 80);
/// Purple for drift
const PURPLE: Color = Color::Rgb(138, 43, 226);
/// Soft white for primary text
const TEXT: Color = Color::Rgb(250, 250, 250);
/// Dim gray for secondary text
const DIM: Color = Color::Rgb(128, 128, 128);

/// Border color for metric cards
const BORDER_METRICS: Color = Color::Rgb(0, 150, 150);
/// Border color for the trace stream
const BORDER_TRACE: Color = Color::Rgb(80, 160, 80);
/// Border color for controls
const BORDER_CONTROLS: Color = Color::Rgb(180, 100, 180);
/// Border color for the system status panel
const BORDER_STATUS: Color = Color::Rgb(100, 180, 100);

/// Span type badge colors
const BADGE_USER: Color = Color::Rgb(0, 180, 180);
const BADGE_AGENT: Color = Color::Rgb(220, 180, 0);
const BADGE_TOOL: Color = Color::Rgb(120, 160, 255);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App) {
    match app.view_mode {
        ViewMode::Onboarding => onboarding::render_onboarding(frame, app),
        ViewMode::Dashboard => dashboard::render_dashboard(frame, app),
    }
}

/// Render the header: app name, mode tabs, and chaos badges.
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::horizontal([
        Constraint::Length(13), // App name
        Constraint::Min(1),     // Tabs
        Constraint::Length(36), // Badges
    ])
    .split(area);

    let app_name = Paragraph::new(" AgentScope").style(Style::default().fg(Color::Cyan).bold());
    frame.render_widget(app_name, chunks[0]);

    let active_style = Style::default()
        .fg(Color::Cyan)
        .bold()
        .add_modifier(Modifier::UNDERLINED);
    let inactive_style = Style::default().fg(Color::DarkGray);
    let mode = app.dashboard.mode();
    let style_for = |m: DashboardMode| {
        if m == mode {
            active_style
        } else {
            inactive_style
        }
    };

    let tabs = Line::from(vec![
        Span::styled(" Simulation ", style_for(DashboardMode::Simulation)),
        Span::styled("  ", Style::default()),
        Span::styled(" Local Agent ", style_for(DashboardMode::Local)),
    ]);
    frame.render_widget(
        Paragraph::new(tabs).block(Block::default().borders(Borders::BOTTOM)),
        chunks[1],
    );

    let mut badges: Vec<Span> = Vec::new();
    for badge in app.dashboard.system_status().badges() {
        badges.push(Span::styled(
            format!(" {} ", badge),
            Style::default().fg(Color::Black).bg(CORAL).bold(),
        ));
        badges.push(Span::raw(" "));
    }
    frame.render_widget(
        Paragraph::new(Line::from(badges))
            .right_aligned()
            .block(Block::default().borders(Borders::BOTTOM)),
        chunks[2],
    );
}

/// Key hints for the footer.
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(error) = &app.last_error {
        let footer = Paragraph::new(Line::from(vec![
            Span::styled(" ! ", Style::default().fg(ALERT).bold()),
            Span::styled(error.as_str(), Style::default().fg(ALERT)),
        ]));
        frame.render_widget(footer, area);
        return;
    }

    let key_style = Style::default().fg(ACCENT).bold();
    let label_style = Style::default().fg(Color::DarkGray);
    let separator = Span::styled("  │  ", Style::default().fg(Color::DarkGray));

    let mut spans = vec![Span::raw(" ")];
    let hints: &[(&str, &str)] = match (app.input_mode, app.dashboard.mode()) {
        (InputMode::Editing, _) => &[("[Enter]", " Send"), ("[Esc]", " Cancel")],
        (InputMode::Normal, DashboardMode::Simulation) => &[
            ("[Space]", " Run/Pause"),
            ("[x]", " Stop"),
            ("[[ ]]", " Knob"),
            ("[←/→]", " Adjust"),
            ("[Tab]", " Local"),
            ("[q]", " Quit"),
        ],
        (InputMode::Normal, DashboardMode::Local) => &[
            ("[l]", " Load"),
            ("[i]", " Prompt"),
            ("[f]", " Flexible"),
            ("[x]", " Stop"),
            ("[Tab]", " Simulation"),
            ("[q]", " Quit"),
        ],
    };
    for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(separator.clone());
        }
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rounded block with a colored title.
fn panel(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .title(title)
        .title_style(Style::default().fg(color).bold())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
}

fn span_type_color(span_type: SpanType) -> Color {
    match span_type {
        SpanType::User => BADGE_USER,
        SpanType::Agent => BADGE_AGENT,
        SpanType::Tool => BADGE_TOOL,
        SpanType::Error => ALERT,
    }
}
