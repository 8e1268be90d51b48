//! Application state for the TUI.

use std::time::Instant;

use agentscope_core::{AgentStatus, ChaosKnob, Dashboard, DashboardMode, SimulationStatus};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which screen is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ViewMode {
    /// Entry screen offering the two demos
    #[default]
    Onboarding,
    /// Main dashboard
    Dashboard,
}

/// Whether keys drive the dashboard or type into the prompt box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InputMode {
    #[default]
    Normal,
    Editing,
}

/// Main application state.
pub struct App {
    pub dashboard: Dashboard,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    /// Prompt being typed for the local agent
    pub prompt: String,
    /// Index into [`ChaosKnob::ALL`]
    pub selected_knob: usize,
    /// Trace stream scroll position (0 = newest at top)
    pub trace_scroll_offset: usize,
    /// Last action or poll failure, shown in the footer until the next key
    pub last_error: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            view_mode: ViewMode::Onboarding,
            input_mode: InputMode::Normal,
            prompt: String::new(),
            selected_knob: 0,
            trace_scroll_offset: 0,
            last_error: None,
            should_quit: false,
        }
    }

    pub fn selected_knob(&self) -> ChaosKnob {
        ChaosKnob::ALL[self.selected_knob % ChaosKnob::ALL.len()]
    }

    /// Launch the low-chaos simulation demo.
    pub fn start_simulation_demo(&mut self, now: Instant) {
        self.dashboard.start_simulation_demo(now);
        self.view_mode = ViewMode::Dashboard;
        self.trace_scroll_offset = 0;
    }

    /// Launch the local model demo.
    pub fn start_local_demo(&mut self, now: Instant) {
        self.view_mode = ViewMode::Dashboard;
        self.trace_scroll_offset = 0;
        if let Err(e) = self.dashboard.start_local_demo(now) {
            self.report(e);
        }
    }

    /// Advance timers and drain worker replies.
    pub fn tick(&mut self, now: Instant) {
        if let Err(e) = self.dashboard.poll(now) {
            tracing::warn!(error = %e, "Dashboard poll failed");
            self.last_error = Some(e.to_string());
        }
    }

    fn report(&mut self, e: agentscope_core::Error) {
        tracing::warn!(error = %e, "Action failed");
        self.last_error = Some(e.to_string());
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match (self.view_mode, self.input_mode) {
            (ViewMode::Onboarding, _) => self.handle_onboarding_key(key, now),
            (ViewMode::Dashboard, InputMode::Editing) => self.handle_prompt_key(key, now),
            (ViewMode::Dashboard, InputMode::Normal) => self.handle_dashboard_key(key, now),
        }
    }

    fn handle_onboarding_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.start_simulation_demo(now),
            KeyCode::Char('2') => self.start_local_demo(now),
            KeyCode::Enter | KeyCode::Esc => self.view_mode = ViewMode::Dashboard,
            _ => {}
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent, now: Instant) {
        self.last_error = None;

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.view_mode = ViewMode::Onboarding,
            KeyCode::Tab => {
                let next = match self.dashboard.mode() {
                    DashboardMode::Simulation => DashboardMode::Local,
                    DashboardMode::Local => DashboardMode::Simulation,
                };
                self.dashboard.switch_mode(next, now);
                self.trace_scroll_offset = 0;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = self.dashboard.board().len().saturating_sub(1);
                self.trace_scroll_offset = (self.trace_scroll_offset + 1).min(max);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.trace_scroll_offset = self.trace_scroll_offset.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => self.trace_scroll_offset = 0,
            KeyCode::Char('[') => {
                self.selected_knob =
                    (self.selected_knob + ChaosKnob::ALL.len() - 1) % ChaosKnob::ALL.len();
            }
            KeyCode::Char(']') => {
                self.selected_knob = (self.selected_knob + 1) % ChaosKnob::ALL.len();
            }
            KeyCode::Left | KeyCode::Char('-') => {
                let knob = self.selected_knob();
                self.dashboard.adjust_chaos(knob, -1, now);
            }
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => {
                let knob = self.selected_knob();
                self.dashboard.adjust_chaos(knob, 1, now);
            }
            _ => match self.dashboard.mode() {
                DashboardMode::Simulation => self.handle_simulation_key(key, now),
                DashboardMode::Local => self.handle_local_key(key, now),
            },
        }
    }

    fn handle_simulation_key(&mut self, key: KeyEvent, now: Instant) {
        let status = match key.code {
            KeyCode::Char('s') | KeyCode::Char(' ') => {
                if self.dashboard.driver().status() == SimulationStatus::Running {
                    SimulationStatus::Paused
                } else {
                    SimulationStatus::Running
                }
            }
            KeyCode::Char('p') => SimulationStatus::Paused,
            KeyCode::Char('x') => SimulationStatus::Idle,
            _ => return,
        };
        self.dashboard.set_simulation_status(status, now);
    }

    fn handle_local_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('l') => {
                if let Err(e) = self.dashboard.load_model() {
                    self.report(e);
                }
            }
            KeyCode::Char('i') | KeyCode::Enter => {
                if self.can_prompt() {
                    self.input_mode = InputMode::Editing;
                }
            }
            KeyCode::Char('f') => {
                if let Err(e) = self.dashboard.toggle_flexible_mode(now) {
                    self.report(e);
                }
            }
            KeyCode::Char('x') => self.dashboard.stop_agent(),
            _ => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                let prompt = self.prompt.trim().to_string();
                if prompt.is_empty() || !self.can_prompt() {
                    return;
                }
                match self.dashboard.run_agent(&prompt, now) {
                    Ok(_) => {
                        self.prompt.clear();
                        self.input_mode = InputMode::Normal;
                        self.trace_scroll_offset = 0;
                    }
                    Err(e) => self.report(e),
                }
            }
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Char(c) => self.prompt.push(c),
            _ => {}
        }
    }

    /// The prompt box accepts input only while the model is idle and ready.
    pub fn can_prompt(&self) -> bool {
        self.dashboard.agent().status() == AgentStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentscope_core::local_agent::{InferencePipeline, LoadProgress, PipelineLoader};
    use agentscope_core::simulation::DEFAULT_TICK_INTERVAL;
    use agentscope_core::{LocalAgent, SimulationConfig, SimulationDriver};
    use crossterm::event::KeyEventKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    struct Offline;

    impl PipelineLoader for Offline {
        fn load(
            &mut self,
            _: &mut dyn FnMut(LoadProgress),
        ) -> agentscope_core::Result<Box<dyn InferencePipeline>> {
            Err(agentscope_core::Error::Inference("offline".to_string()))
        }
    }

    fn app() -> App {
        let dashboard = Dashboard::with_parts(
            SimulationConfig::default(),
            SimulationDriver::with_rng(DEFAULT_TICK_INTERVAL, StdRng::seed_from_u64(4)),
            LocalAgent::with_loader(Box::new(Offline), "tiny (Worker)", Duration::ZERO),
        );
        App::new(dashboard)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn test_onboarding_simulation_demo() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Char('1')), now);

        assert_eq!(app.view_mode, ViewMode::Dashboard);
        assert_eq!(app.dashboard.driver().status(), SimulationStatus::Running);
        assert_eq!(*app.dashboard.chaos(), SimulationConfig::low_chaos());
    }

    #[test]
    fn test_space_toggles_run_and_pause() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Enter), now);
        app.handle_key(key(KeyCode::Char(' ')), now);
        assert_eq!(app.dashboard.driver().status(), SimulationStatus::Running);
        app.handle_key(key(KeyCode::Char(' ')), now);
        assert_eq!(app.dashboard.driver().status(), SimulationStatus::Paused);
        app.handle_key(key(KeyCode::Char('x')), now);
        assert_eq!(app.dashboard.driver().status(), SimulationStatus::Idle);
    }

    #[test]
    fn test_knob_selection_and_adjustment() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Enter), now);

        app.handle_key(key(KeyCode::Char(']')), now);
        assert_eq!(app.selected_knob(), ChaosKnob::ErrorRate);
        app.handle_key(key(KeyCode::Right), now);
        assert_eq!(app.dashboard.chaos().error_rate, 0.1);

        app.handle_key(key(KeyCode::Char('[')), now);
        app.handle_key(key(KeyCode::Char('[')), now);
        assert_eq!(app.selected_knob(), ChaosKnob::DriftLevel);
    }

    #[test]
    fn test_tab_switches_mode() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Enter), now);
        app.handle_key(key(KeyCode::Tab), now);
        assert_eq!(app.dashboard.mode(), DashboardMode::Local);

        // simulation keys are inert in local mode
        app.handle_key(key(KeyCode::Char('s')), now);
        assert_eq!(app.dashboard.driver().status(), SimulationStatus::Idle);
    }

    #[test]
    fn test_prompt_requires_ready_model() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Enter), now);
        app.handle_key(key(KeyCode::Tab), now);
        app.handle_key(key(KeyCode::Char('i')), now);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_flexible_toggle_before_load_is_accepted() {
        let mut app = app();
        let now = Instant::now();
        app.handle_key(key(KeyCode::Enter), now);
        app.handle_key(key(KeyCode::Tab), now);
        app.handle_key(key(KeyCode::Char('f')), now);
        assert!(app.last_error.is_none());
        assert!(app.dashboard.agent().is_flexible_running());
    }
}
