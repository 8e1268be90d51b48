use super::*;

pub(super) fn render_onboarding(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Min(12),   // Cards
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, app, chunks[0]);

    let centered = Layout::horizontal([
        Constraint::Percentage(10),
        Constraint::Percentage(80),
        Constraint::Percentage(10),
    ])
    .split(chunks[1])[1];

    let rows = Layout::vertical([
        Constraint::Length(4), // Welcome
        Constraint::Length(7), // Demos
        Constraint::Min(0),
    ])
    .split(centered);

    let welcome = Paragraph::new(vec![
        Line::from(Span::styled(
            "Watch an agent think.",
            Style::default().fg(TEXT).bold(),
        )),
        Line::from(Span::styled(
            "Stream synthetic traces with tunable chaos, or drive a real local model.",
            Style::default().fg(DIM),
        )),
    ])
    .centered();
    frame.render_widget(welcome, rows[0]);

    let cards = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let simulation = Paragraph::new(vec![
        Line::from(Span::styled(
            "Replays a scripted sales-analysis agent every 2s.",
            Style::default().fg(TEXT),
        )),
        Line::from(Span::styled(
            "Starts with low chaos; tune latency, errors and drift live.",
            Style::default().fg(DIM),
        )),
        Line::raw(""),
        Line::from(vec![
            Span::styled("[1]", Style::default().fg(ACCENT).bold()),
            Span::styled(" Run simulation demo", Style::default().fg(ACCENT)),
        ]),
    ])
    .wrap(Wrap { trim: true })
    .block(panel(" Simulation ", BORDER_TRACE));
    frame.render_widget(simulation, cards[0]);

    let local = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("Loads {} on a background worker.", app.dashboard.agent().model_label()),
            Style::default().fg(TEXT),
        )),
        Line::from(Span::styled(
            "Flexible mode starts as soon as the model is ready.",
            Style::default().fg(DIM),
        )),
        Line::raw(""),
        Line::from(vec![
            Span::styled("[2]", Style::default().fg(ACCENT).bold()),
            Span::styled(" Test local AI", Style::default().fg(ACCENT)),
        ]),
    ])
    .wrap(Wrap { trim: true })
    .block(panel(" Local Agent ", BORDER_CONTROLS));
    frame.render_widget(local, cards[1]);

    let footer = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled("[1/2]", Style::default().fg(ACCENT).bold()),
        Span::styled(" Start demo  ", Style::default().fg(Color::DarkGray)),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled("[Enter]", Style::default().fg(ACCENT).bold()),
        Span::styled(" Skip to dashboard  ", Style::default().fg(Color::DarkGray)),
        Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
        Span::styled("[q]", Style::default().fg(ACCENT).bold()),
        Span::styled(" Quit", Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(footer, chunks[2]);
}
