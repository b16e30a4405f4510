use std::collections::HashMap;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::control::Command;
use super::layout::Layout;
use super::logs::{LogMessage, LogPane};
use crate::config::{Config, Theme};
use crate::engine::LogSource;
use crate::container::{ContainerID, ContainerRecord};
use crate::metrics::{ContainerMetrics, MetricsStore, RateView, humanize_bytes};
use crate::plot::{self, ColorGradient};
use crate::stack::StackDescriptor;
use crate::telemetry::{ContainerEvent, ContainerUpdate};

/// What the terminal loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Control { command: Command, id: ContainerID },
}

/// Everything the dashboard shows, rebuilt from [`ContainerEvent`]s.
///
/// The records are read-only copies; the authoritative state lives with the
/// telemetry tasks.
#[derive(Debug)]
pub struct Dashboard {
    stack: Arc<StackDescriptor>,
    config: Config,
    layout: Layout,
    records: HashMap<ContainerID, ContainerRecord>,
    metrics: MetricsStore,
    selected: Option<ContainerID>,
    logs: Option<LogPane>,
}

impl Dashboard {
    pub fn new(stack: Arc<StackDescriptor>, config: Config, width: u16, height: u16) -> Self {
        let layout = Layout::compute(width, height, &config.layout);
        Self {
            stack,
            metrics: MetricsStore::new(layout.widths),
            config,
            layout,
            records: HashMap::new(),
            selected: None,
            logs: None,
        }
    }

    pub fn apply(&mut self, event: ContainerEvent) {
        if let ContainerEvent::Update(update) = &event {
            if !self.records.contains_key(&update.id) {
                log::debug!("update for untracked container {}", update.id.short());
                return;
            }
        }
        self.metrics.apply(&event);

        match event {
            ContainerEvent::Create { id } => {
                self.records
                    .insert(id.clone(), ContainerRecord::pending(id));
            }
            ContainerEvent::Update(update) => {
                let ContainerUpdate {
                    id,
                    inspect,
                    stats,
                    processes,
                } = *update;
                let record = ContainerRecord::from_update(id.clone(), &inspect, stats, processes);
                self.records.insert(id, record);
            }
            ContainerEvent::Remove { id } => {
                self.records.remove(&id);
            }
        }
        self.fix_selection();
    }

    /// Adds a followed log line. Lines of a container the pane no longer
    /// shows are dropped.
    pub fn push_log(&mut self, message: LogMessage) {
        match &mut self.logs {
            Some(pane) if pane.id() == &message.id => pane.push(message.line),
            _ => {}
        }
    }

    /// The container whose logs should be followed, if the pane is open.
    pub fn log_target(&self) -> Option<&ContainerID> {
        self.logs.as_ref().map(LogPane::id)
    }

    pub fn logs(&self) -> Option<&LogPane> {
        self.logs.as_ref()
    }

    fn toggle_logs(&mut self) {
        self.logs = match self.logs {
            Some(_) => None,
            None => self.selected.clone().map(LogPane::new),
        };
    }

    /// Points an open pane at the selected container, closing it when nothing is selected.
    fn sync_logs(&mut self) {
        if self.logs.is_none() || self.log_target() == self.selected.as_ref() {
            return;
        }
        self.logs = self.selected.clone().map(LogPane::new);
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.layout = Layout::compute(width, height, &self.config.layout);
        self.metrics.resize(self.layout.widths);
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    /// Tracked containers in display order.
    pub fn rows(&self) -> Vec<&ContainerRecord> {
        let mut rows: Vec<&ContainerRecord> = self.records.values().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    pub fn selected(&self) -> Option<&ContainerRecord> {
        self.selected.as_ref().and_then(|id| self.records.get(id))
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_previous(&mut self) {
        self.move_selection(-1);
    }

    fn move_selection(&mut self, step: isize) {
        let next = {
            let rows = self.rows();
            let Some(current) = self.selected_index(&rows) else {
                return;
            };
            let next = current.saturating_add_signed(step).min(rows.len() - 1);
            rows[next].id.clone()
        };
        self.selected = Some(next);
        self.sync_logs();
    }

    fn selected_index(&self, rows: &[&ContainerRecord]) -> Option<usize> {
        let selected = self.selected.as_ref()?;
        rows.iter().position(|record| &record.id == selected)
    }

    fn fix_selection(&mut self) {
        if self.selected().is_none() {
            let first = self.rows().first().map(|record| record.id.clone());
            self.selected = first;
        }
        self.sync_logs();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
                Action::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                Action::None
            }
            KeyCode::Char('p') => self.control(Command::toggle_pause),
            KeyCode::Char('s') => self.control(Command::toggle_run),
            KeyCode::Char('l') => {
                self.toggle_logs();
                Action::None
            }
            KeyCode::Char(digit @ ('1' | '2')) => {
                if let Some(pane) = &mut self.logs {
                    pane.show(if digit == '1' {
                        LogSource::Stdout
                    } else {
                        LogSource::Stderr
                    });
                }
                Action::None
            }
            _ => Action::None,
        }
    }

    fn control(&self, choose: fn(crate::container::LifecycleState) -> Command) -> Action {
        match self.selected() {
            Some(record) if record.is_loaded() => Action::Control {
                command: choose(record.state),
                id: record.id.clone(),
            },
            _ => Action::None,
        }
    }

    /// The whole frame, at most `height` lines.
    pub fn render(&self) -> Vec<String> {
        let width = self.layout.width;
        let mut lines = Vec::with_capacity(self.layout.height);

        lines.push(fit(
            &format!(
                "stack {} | {} containers | q quit  j/k select  p pause  s start/stop  l logs",
                self.stack.name(),
                self.records.len()
            ),
            width,
        ));
        self.container_table(&mut lines);
        lines.push(fit(&self.details(), width));
        self.plots(&mut lines);
        match &self.logs {
            Some(pane) => self.log_table(pane, &mut lines),
            None => self.process_table(&mut lines),
        }

        lines.truncate(self.layout.height);
        lines
    }

    fn container_table(&self, lines: &mut Vec<String>) {
        let width = self.layout.width;
        lines.push(fit(
            &format!(
                "  {:<24} {:<11} {:<28} {:>8} {:>12}",
                "NAME", "STATUS", "IMAGE", "CPU", "MEMORY"
            ),
            width,
        ));

        let rows = self.rows();
        let mut table: Vec<String> = rows
            .iter()
            .map(|record| {
                let marker = if Some(&record.id) == self.selected.as_ref() {
                    ">"
                } else {
                    " "
                };
                let name = match record.name.as_str() {
                    "" => record.id.short(),
                    name => self.stack.display_name(name),
                };
                let status = if record.is_loaded() {
                    record.state.as_str()
                } else {
                    "loading"
                };
                let metrics = self.metrics.get(&record.id);
                let cpu = metrics
                    .and_then(|m| m.cpu.current().ok())
                    .map_or_else(|| "-".to_owned(), |cpu| format!("{cpu:.2}%"));
                let memory = metrics
                    .and_then(|m| m.memory.current().ok())
                    .map_or_else(|| "-".to_owned(), humanize_bytes);
                format!(
                    "{marker} {:<24} {:<11} {:<28} {:>8} {:>12}",
                    name, status, record.image, cpu, memory
                )
            })
            .collect();

        let live_names = rows.iter().map(|record| record.name.as_str());
        table.extend(self.stack.placeholders(live_names).into_iter().map(|service| {
            format!(
                "  {:<24} {:<11} {:<28} {:>8} {:>12}",
                self.stack.display_name(&service.name),
                "not created",
                service.image,
                "-",
                "-"
            )
        }));

        let visible = self.layout.table_rows;
        let start = self
            .selected_index(&rows)
            .map_or(0, |index| (index + 1).saturating_sub(visible));
        for row in 0..visible {
            lines.push(fit(table.get(start + row).map_or("", String::as_str), width));
        }
    }

    /// One line about the selected container: id, image, state and addresses.
    fn details(&self) -> String {
        match self.selected() {
            Some(record) if record.is_loaded() => {
                let addresses = match record.addresses.as_slice() {
                    [] => "-".to_owned(),
                    addresses => addresses.join(", "),
                };
                format!(
                    "id: {}  image: {}  state: {}  addresses: {}",
                    record.id.short(),
                    record.image,
                    record.state,
                    addresses
                )
            }
            _ => format!("details: {}", plot::PLACEHOLDER),
        }
    }

    fn plots(&self, lines: &mut Vec<String>) {
        let width = self.layout.width;
        let height = self.layout.plot_height;
        let theme: &Theme = &self.config.theme;
        let metrics = self.selected().and_then(|record| self.metrics.get(&record.id));

        let Some(metrics) = metrics else {
            for caption in ["cpu", "memory", "network", "i/o"] {
                lines.push(fit(&format!("{caption}: {}", plot::PLACEHOLDER), width));
                lines.extend(std::iter::repeat_n(" ".repeat(width), height));
            }
            return;
        };

        lines.push(fit(&cpu_caption(metrics), width));
        lines.extend(plot_block(
            &metrics.cpu.window().to_vec(),
            metrics.cpu.scale(),
            width,
            height,
            &theme.cpu,
        ));

        lines.push(fit(&memory_caption(metrics), width));
        lines.extend(plot_block(
            &metrics.memory.window().to_vec(),
            metrics.memory.scale(),
            width,
            height,
            &theme.memory,
        ));

        let half = self.layout.widths.network;
        lines.extend(rate_pair(
            ("rx", &metrics.rx),
            ("tx", &metrics.tx),
            half,
            height,
            &theme.network,
        ));
        lines.extend(rate_pair(
            ("read", &metrics.read),
            ("write", &metrics.write),
            self.layout.widths.io,
            height,
            &theme.io,
        ));
    }

    fn process_table(&self, lines: &mut Vec<String>) {
        let width = self.layout.width;
        lines.push(fit(
            &format!(
                "{:>8} {:>8} {:>4} {:>10} {:>6} CMD",
                "PID", "PPID", "THR", "RSS", "%CPU"
            ),
            width,
        ));

        let processes = self
            .selected()
            .map(|record| record.processes.as_slice())
            .unwrap_or_default();
        for row in 0..self.layout.process_rows {
            let line = processes.get(row).map_or_else(String::new, |process| {
                let rss = process.rss.parse::<u64>().map_or_else(
                    |_| process.rss.clone(),
                    |kib| humanize_bytes(kib.saturating_mul(1024)),
                );
                format!(
                    "{:>8} {:>8} {:>4} {:>10} {:>6} {}",
                    process.pid, process.ppid, process.threads, rss, process.cpu, process.cmd
                )
            });
            lines.push(fit(&line, width));
        }
    }

    fn log_table(&self, pane: &LogPane, lines: &mut Vec<String>) {
        let width = self.layout.width;
        let shown = match pane.shown() {
            LogSource::Stderr => "stderr",
            LogSource::Stdin | LogSource::Stdout => "stdout",
        };
        lines.push(fit(
            &format!("logs: {shown}  1 stdout  2 stderr  l close"),
            width,
        ));

        let rows = self.layout.process_rows;
        let tail = pane.tail(rows);
        for row in 0..rows {
            lines.push(fit(tail.get(row).copied().unwrap_or_default(), width));
        }
    }
}

fn cpu_caption(metrics: &ContainerMetrics) -> String {
    match metrics.cpu.current() {
        Ok(cpu) => format!(
            "cpu: {cpu:.2}%  scale: {:.0}%",
            metrics.cpu.scale() * 100.0
        ),
        Err(_) => format!("cpu: {}", plot::PLACEHOLDER),
    }
}

fn memory_caption(metrics: &ContainerMetrics) -> String {
    match metrics.memory.current() {
        Ok(usage) => format!(
            "memory: {}  limit: {}",
            humanize_bytes(usage),
            humanize_bytes(metrics.memory.limit())
        ),
        Err(_) => format!("memory: {}", plot::PLACEHOLDER),
    }
}

fn rate_caption(label: &str, view: &RateView) -> String {
    match (view.current(), view.max(), view.total()) {
        (Ok(current), Ok(max), Ok(total)) => format!(
            "{label}: {}/s  total: {}  max: {}/s",
            humanize_bytes(current),
            humanize_bytes(total),
            humanize_bytes(max)
        ),
        _ => format!("{label}: {}", plot::PLACEHOLDER),
    }
}

/// Two rate plots side by side, each `half` columns wide, caption line first.
fn rate_pair(
    left: (&str, &RateView),
    right: (&str, &RateView),
    half: usize,
    height: usize,
    gradient: &ColorGradient,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}",
        fit(&rate_caption(left.0, left.1), half),
        fit(&rate_caption(right.0, right.1), half)
    )];
    let left = plot_block(&left.1.normalized(), 1.0, half, height, gradient);
    let right = plot_block(&right.1.normalized(), 1.0, half, height, gradient);
    lines.extend(left.into_iter().zip(right).map(|(l, r)| format!("{l} {r}")));
    lines
}

/// Exactly `height` lines: the plot, or the placeholder followed by blanks.
fn plot_block(
    samples: &[f64],
    scale: f64,
    width: usize,
    height: usize,
    gradient: &ColorGradient,
) -> Vec<String> {
    if height == 0 {
        return Vec::new();
    }
    let rendered = plot::render(samples, scale, width, height, Some(gradient));
    if rendered == plot::PLACEHOLDER {
        let mut block = vec![fit(plot::PLACEHOLDER, width)];
        block.extend(std::iter::repeat_n(" ".repeat(width), height - 1));
        return block;
    }
    rendered.lines().map(str::to_owned).collect()
}

/// Cuts or pads `text` to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let mut fitted: String = text.chars().take(width).collect();
    let len = fitted.chars().count();
    fitted.extend(std::iter::repeat_n(' ', width - len));
    fitted
}
