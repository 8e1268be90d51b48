use agentscope_core::dashboard::ChartPoint;
use agentscope_core::format::{format_clock, format_cost, format_latency, format_tokens};
use agentscope_core::{AgentMode, AgentStatus, ChaosKnob, SimulationStatus, TraceSpan};

use super::*;

pub(super) fn render_dashboard(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header, metric cards, body, footer
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(4), // Metric cards
        Constraint::Min(10),   // Body
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, app, chunks[0]);
    render_metric_cards(frame, app, chunks[1]);

    // Body: trace stream (left) | chart, controls, status (right)
    let body = Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(chunks[2]);
    render_trace_stream(frame, app, body[0]);

    let side = Layout::vertical([
        Constraint::Length(8), // Chart
        Constraint::Min(7),    // Controls
        Constraint::Length(5), // System status
    ])
    .split(body[1]);
    render_chart(frame, &app.dashboard.chart_points(), side[0]);
    match app.dashboard.mode() {
        DashboardMode::Simulation => render_simulation_controls(frame, app, side[1]),
        DashboardMode::Local => render_local_controls(frame, app, side[1]),
    }
    render_system_status(frame, app, side[2]);

    render_footer(frame, app, chunks[3]);
}

fn render_metric_cards(frame: &mut Frame, app: &App, area: Rect) {
    let metrics = app.dashboard.metrics();
    let cards = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);

    let values = [
        (" Total Spend ", format_cost(metrics.total_cost), GOLD),
        (" Avg Latency ", format_latency(metrics.avg_latency), ACCENT),
        (" Total Tokens ", format_tokens(metrics.total_tokens), LIME),
        (
            " Errors ",
            metrics.error_count.to_string(),
            if metrics.error_count > 0 { ALERT } else { TEXT },
        ),
    ];

    for ((title, value, color), card) in values.into_iter().zip(cards.iter()) {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            format!(" {}", value),
            Style::default().fg(color).bold(),
        )))
        .block(panel(title, BORDER_METRICS));
        frame.render_widget(paragraph, *card);
    }
}

fn render_trace_stream(frame: &mut Frame, app: &App, area: Rect) {
    // Spans are held newest-first and displayed newest at top
    let visible_height = area.height.saturating_sub(2) as usize; // Account for borders
    let board = app.dashboard.board();
    let total = board.len();
    let scroll_offset = app
        .trace_scroll_offset
        .min(total.saturating_sub(visible_height));

    let lines: Vec<Line> = if total == 0 {
        vec![Line::from(Span::styled(
            empty_trace_hint(app),
            Style::default().fg(DIM).italic(),
        ))]
    } else {
        board
            .spans()
            .skip(scroll_offset)
            .take(visible_height)
            .map(format_trace_row)
            .collect()
    };

    let title = format!(" Trace Stream ({}) ", total);
    frame.render_widget(Paragraph::new(lines).block(panel(&title, BORDER_TRACE)), area);

    if total > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        let mut scrollbar_state =
            ScrollbarState::new(total.saturating_sub(visible_height)).position(scroll_offset);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn empty_trace_hint(app: &App) -> &'static str {
    match app.dashboard.mode() {
        DashboardMode::Simulation => " Press Space to start the simulation",
        DashboardMode::Local => " Press l to load the model, then i to prompt",
    }
}

/// One trace row: time, type badge, latency, content, metadata chips.
fn format_trace_row(span: &TraceSpan) -> Line<'_> {
    let color = span_type_color(span.span_type);
    let mut spans = vec![
        Span::styled(
            format!(" {} ", format_clock(span.timestamp)),
            Style::default().fg(DIM),
        ),
        Span::styled(
            format!("{:<5}", span.span_type.as_str().to_uppercase()),
            Style::default().fg(color).bold(),
        ),
    ];

    if let Some(latency) = span.latency_ms {
        spans.push(Span::styled(
            format!(" {:>6}", format_latency(latency as f64)),
            Style::default().fg(DIM),
        ));
    }

    let content_style = if span.is_error() {
        Style::default().fg(ALERT)
    } else {
        Style::default().fg(TEXT)
    };
    spans.push(Span::styled(format!("  {}", span.content), content_style));

    if let Some(metadata) = &span.metadata {
        for (key, value) in metadata {
            let chip_color = if key == agentscope_core::metadata_keys::WARNING {
                CORAL
            } else {
                PURPLE
            };
            spans.push(Span::styled(
                format!("  {}: {}", key, value),
                Style::default().fg(chip_color),
            ));
        }
    }

    Line::from(spans)
}

fn render_chart(frame: &mut Frame, points: &[ChartPoint], area: Rect) {
    let block = panel(" Latency & Drift ", ACCENT);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if points.is_empty() {
        frame.render_widget(
            Paragraph::new("No spans yet").style(Style::default().fg(DIM).italic()),
            inner,
        );
        return;
    }

    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .split(inner);

    let latency: Vec<u64> = points.iter().map(|p| p.latency_ms as u64).collect();
    let drift: Vec<u64> = points.iter().map(|p| p.drift as u64).collect();
    let peak = latency.iter().copied().max().unwrap_or(0);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Latency ", Style::default().fg(ACCENT)),
            Span::styled(format!("peak {}ms", peak), Style::default().fg(DIM)),
        ])),
        rows[0],
    );
    frame.render_widget(
        Sparkline::default()
            .data(&latency)
            .style(Style::default().fg(ACCENT))
            .bar_set(symbols::bar::NINE_LEVELS),
        rows[1],
    );
    frame.render_widget(
        Paragraph::new(Span::styled("Drift %", Style::default().fg(PURPLE))),
        rows[2],
    );
    frame.render_widget(
        Sparkline::default()
            .data(&drift)
            .max(100)
            .style(Style::default().fg(PURPLE))
            .bar_set(symbols::bar::NINE_LEVELS),
        rows[3],
    );
}

fn render_simulation_controls(frame: &mut Frame, app: &App, area: Rect) {
    let driver = app.dashboard.driver();
    let (status_label, status_color) = match driver.status() {
        SimulationStatus::Idle => ("IDLE", DIM),
        SimulationStatus::Running => ("RUNNING", LIME),
        SimulationStatus::Paused => ("PAUSED", GOLD),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Simulation ", Style::default().fg(DIM)),
            Span::styled(status_label, Style::default().fg(status_color).bold()),
            Span::styled(format!("  step {}", driver.step()), Style::default().fg(DIM)),
        ]),
        Line::raw(""),
    ];

    let chaos = app.dashboard.chaos();
    let selected = app.selected_knob();
    for knob in ChaosKnob::ALL {
        let is_selected = knob == selected;
        let marker = if is_selected { "▸ " } else { "  " };
        let value = knob.get(chaos);
        let formatted = match knob {
            ChaosKnob::LatencyMultiplier => format!("{:.1}x", value),
            ChaosKnob::ErrorRate | ChaosKnob::DriftLevel => format!("{:.0}%", value * 100.0),
        };
        let label_style = if is_selected {
            Style::default().fg(ACCENT).bold()
        } else {
            Style::default().fg(TEXT)
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(ACCENT)),
            Span::styled(format!("{:<20}", knob.label()), label_style),
            Span::styled(knob_bar(knob, value), Style::default().fg(BORDER_CONTROLS)),
            Span::styled(format!(" {}", formatted), Style::default().fg(GOLD)),
        ]));
    }

    frame.render_widget(
        Paragraph::new(lines).block(panel(" Chaos Controls ", BORDER_CONTROLS)),
        area,
    );
}

/// Ten-cell slider for a knob position.
fn knob_bar(knob: ChaosKnob, value: f64) -> String {
    let (min, max) = knob.bounds();
    let filled = (((value - min) / (max - min)) * 10.0).round().clamp(0.0, 10.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn render_local_controls(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(" Local Agent ", BORDER_CONTROLS);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let agent = app.dashboard.agent();
    let rows = Layout::vertical([
        Constraint::Length(2), // Status lines
        Constraint::Length(1), // Progress gauge
        Constraint::Min(1),    // Prompt
    ])
    .split(inner);

    let (status_label, status_color) = match agent.status() {
        AgentStatus::Idle => ("IDLE", DIM),
        AgentStatus::Loading => ("LOADING", GOLD),
        AgentStatus::Ready => ("READY", LIME),
        AgentStatus::Running => ("RUNNING", ACCENT),
        AgentStatus::Error => ("ERROR", ALERT),
    };
    let flexible = if agent.mode() == AgentMode::Flexible {
        Span::styled("  FLEXIBLE", Style::default().fg(PURPLE).bold())
    } else {
        Span::styled("  manual", Style::default().fg(DIM))
    };
    let mut status_line = vec![
        Span::styled(status_label, Style::default().fg(status_color).bold()),
        flexible,
    ];
    if app.dashboard.auto_start_pending() {
        status_line.push(Span::styled("  (auto-start)", Style::default().fg(DIM)));
    }
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(vec![
                Span::styled("Model ", Style::default().fg(DIM)),
                Span::styled(agent.model_label(), Style::default().fg(TEXT)),
            ]),
            Line::from(status_line),
        ]),
        rows[0],
    );

    if let Some(progress) = agent.progress() {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(GOLD).bg(Color::Rgb(40, 40, 40)))
            .ratio((progress.progress / 100.0).clamp(0.0, 1.0))
            .label(Span::styled(
                format!("{:.0}% {}", progress.progress, progress.file),
                Style::default().fg(TEXT).bold(),
            ));
        frame.render_widget(gauge, rows[1]);
    }

    let (prompt_text, prompt_style) = match app.input_mode {
        InputMode::Editing => (format!("> {}▏", app.prompt), Style::default().fg(TEXT)),
        InputMode::Normal if app.can_prompt() => (
            "> press i to type a prompt".to_string(),
            Style::default().fg(DIM).italic(),
        ),
        InputMode::Normal => (
            "> waiting for model".to_string(),
            Style::default().fg(DIM).italic(),
        ),
    };
    frame.render_widget(
        Paragraph::new(prompt_text)
            .style(prompt_style)
            .wrap(Wrap { trim: false }),
        rows[2],
    );
}

fn render_system_status(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .dashboard
        .system_status()
        .services()
        .iter()
        .map(|(name, health)| {
            let color = if health.is_healthy() { LIME } else { CORAL };
            Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::styled(format!("{:<24}", name), Style::default().fg(TEXT)),
                Span::styled(health.label(), Style::default().fg(color)),
            ])
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines).block(panel(" System Status ", BORDER_STATUS)),
        area,
    );
}
