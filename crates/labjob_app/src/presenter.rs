use labjob_core::{JobState, JobView};

/// Displays the running job and offers the user a way to cancel it.
pub trait ProgressPresenter: Send {
    fn open(&mut self, title: &str);
    /// Called after every state change while the presenter is open.
    fn render(&mut self, view: &JobView);
    fn close(&mut self);
}

/// Displays a terminal error message.
pub trait ErrorPresenter: Send {
    fn show(&mut self, message: &str);
}

/// Progress lines on stderr; repeated identical lines are suppressed.
#[derive(Debug, Default)]
pub struct TerminalProgressPresenter {
    open: bool,
    last_line: Option<String>,
}

impl TerminalProgressPresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressPresenter for TerminalProgressPresenter {
    fn open(&mut self, title: &str) {
        self.open = true;
        self.last_line = None;
        eprintln!("== {title} ==");
        eprintln!("(press Ctrl-C to cancel)");
    }

    fn render(&mut self, view: &JobView) {
        if !self.open {
            return;
        }
        let line = format_view(view);
        if self.last_line.as_deref() != Some(line.as_str()) {
            eprintln!("{line}");
            self.last_line = Some(line);
        }
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[derive(Debug, Default)]
pub struct TerminalErrorPresenter;

impl ErrorPresenter for TerminalErrorPresenter {
    fn show(&mut self, message: &str) {
        eprintln!("Error: {message}");
    }
}

/// One status line, e.g. `[Active] Iteration 3 (3/10, 30.0%)`.
pub fn format_view(view: &JobView) -> String {
    let mut line = format!("[{}] {}", view.state, view.message);

    let counter = match (view.iteration, view.max_iter) {
        (Some(iteration), Some(max_iter)) => Some(format!("{iteration}/{max_iter}")),
        _ => None,
    };
    let percent = view.progress.map(|p| format!("{:.1}%", p.clamp(0.0, 100.0)));
    let metrics = match (counter, percent) {
        (Some(c), Some(p)) => format!("{c}, {p}"),
        (Some(c), None) => c,
        (None, Some(p)) => p,
        (None, None) => String::new(),
    };
    if !metrics.is_empty() && view.state == JobState::Active {
        line.push_str(&format!(" ({metrics})"));
    }
    if let Some(path) = view.result_path.as_deref() {
        line.push_str(&format!(" -> {path}"));
    }
    line
}
