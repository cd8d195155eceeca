use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use crate::bins::BinSnapshot;
use crate::calibrate::CalibrationResult;
use crate::pipeline::{Phase, PipelineConfig, Strategy};
use crate::stats::StatResult;
use crate::system::SystemInfo;

/// Width of the plain-text histogram's largest bar.
const TEXT_BAR_SCALE: u64 = 100;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Stage {
    Calibrating,
    Running {
        round: usize,
        total_rounds: usize,
        strategy: Strategy,
        phase: Phase,
    },
    Error(String),
    Done,
}

pub struct App {
    pub system: SystemInfo,
    pub config: PipelineConfig,
    pub stage: Stage,
    pub progress: f64,
    pub calibration: Option<CalibrationResult>,
    /// Latest histogram per strategy, indexed by [`Strategy::index`].
    pub histograms: [Option<BinSnapshot>; 3],
    /// Round timings so far per strategy, indexed like `histograms`.
    pub results: [Option<StatResult>; 3],
    pub finished: bool,
}

impl App {
    pub fn new(system: SystemInfo, config: PipelineConfig) -> Self {
        Self {
            system,
            config,
            stage: Stage::Calibrating,
            progress: 0.0,
            calibration: None,
            histograms: Default::default(),
            results: Default::default(),
            finished: false,
        }
    }

    pub fn record(&mut self, strategy: Strategy, hist: BinSnapshot, stats: StatResult) {
        self.histograms[strategy.index()] = Some(hist);
        self.results[strategy.index()] = Some(stats);
    }

    pub fn histogram(&self, strategy: Strategy) -> Option<&BinSnapshot> {
        self.histograms[strategy.index()].as_ref()
    }

    pub fn result(&self, strategy: Strategy) -> Option<&StatResult> {
        self.results[strategy.index()].as_ref()
    }
}

// ---------------------------------------------------------------------------
// Color constants
// ---------------------------------------------------------------------------

const COL_QUEUED: Color = Color::Green;
const COL_DIRECT: Color = Color::Yellow;
const COL_PARTITIONED: Color = Color::Magenta;
const COL_BETTER: Color = Color::Green;
const COL_WORSE: Color = Color::Red;
const COL_DIM: Color = Color::DarkGray;
const COL_LABEL: Color = Color::Cyan;

fn strategy_color(strategy: Strategy) -> Color {
    match strategy {
        Strategy::Queued => COL_QUEUED,
        Strategy::Direct => COL_DIRECT,
        Strategy::Partitioned => COL_PARTITIONED,
    }
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Length(3), // progress
            Constraint::Min(8),    // histogram
            Constraint::Length(7), // summary
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);
    draw_progress(f, chunks[1], app);
    draw_histogram(f, chunks[2], app);
    draw_summary(f, chunks[3], app);
    draw_footer(f, chunks[4], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let cfg = &app.config;
    let lines = vec![
        Line::from(vec![
            Span::styled(
                &app.system.cpu_model,
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" \u{2502} {} CPUs", app.system.ncpus),
                Style::default().fg(COL_DIM),
            ),
        ]),
        Line::from(vec![
            Span::styled(
                format!(
                    "{} producer{} \u{00b7} {} consumer{} \u{00b7} queue {} \u{00b7} {} bins [{}, {}) \u{00b7} {:?}",
                    cfg.producer_count,
                    if cfg.producer_count > 1 { "s" } else { "" },
                    cfg.consumer_count,
                    if cfg.consumer_count > 1 { "s" } else { "" },
                    cfg.queue_capacity,
                    cfg.bin_count,
                    cfg.min_measurement,
                    cfg.max_measurement,
                    cfg.retry,
                ),
                Style::default().fg(COL_DIM),
            ),
            if let Some(ref cal) = app.calibration {
                Span::styled(
                    format!(
                        " \u{00b7} {} samples (auto: {}/s)",
                        format_int(cal.target_count as f64),
                        format_int(cal.probe_samples_per_sec),
                    ),
                    Style::default().fg(COL_DIM),
                )
            } else {
                Span::styled(
                    format!(" \u{00b7} {} samples", format_int(cfg.target_count as f64)),
                    Style::default().fg(COL_DIM),
                )
            },
        ]),
    ];

    let block = Block::default()
        .title(" Histogram Pipeline Benchmark ")
        .title_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::TOP | Borders::LEFT | Borders::RIGHT);
    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn draw_progress(f: &mut Frame, area: Rect, app: &App) {
    let label = match &app.stage {
        Stage::Calibrating => "Calibrating...".to_string(),
        Stage::Running {
            round,
            total_rounds,
            strategy,
            phase,
        } => format!(
            "Round {}/{} [{}] {:?}",
            round,
            total_rounds,
            strategy.label(),
            phase
        ),
        Stage::Error(msg) => format!("Error: {}", msg),
        Stage::Done => "Complete".to_string(),
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT))
        .gauge_style(
            Style::default()
                .fg(match &app.stage {
                    Stage::Running { strategy, .. } => strategy_color(*strategy),
                    Stage::Error(_) => Color::Red,
                    Stage::Done => Color::Green,
                    Stage::Calibrating => Color::Blue,
                })
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(app.progress.clamp(0.0, 1.0));
    f.render_widget(gauge, area);
}

fn draw_histogram(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Bin Distribution ")
        .title_style(Style::default().fg(COL_LABEL))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    const LABEL_W: usize = 18;
    let columns = Strategy::ALL.len();
    if inner.height < 3 || (inner.width as usize) < LABEL_W + 6 * columns {
        return;
    }

    // Each column is a bar between two rules.
    let col_w = (inner.width as usize - LABEL_W - 2 * columns) / columns;
    let mut header = vec![Span::styled(
        format!("{:>w$}", "", w = LABEL_W),
        Style::default(),
    )];
    for strategy in Strategy::ALL {
        header.push(Span::raw(" "));
        header.push(Span::styled(
            center_pad(&strategy.label().to_uppercase(), col_w),
            Style::default()
                .fg(strategy_color(strategy))
                .add_modifier(Modifier::BOLD),
        ));
    }

    let mut lines = vec![Line::from(header)];
    let max_frac = max_histogram_frac(&app.histograms);
    let bar_w = col_w.saturating_sub(1);
    let bounds = app.histograms.iter().flatten().next();

    for bin in 0..app.config.bin_count {
        if lines.len() >= inner.height as usize {
            break;
        }
        let label = bounds
            .and_then(|h| h.ranges().nth(bin))
            .map(|(lo, hi)| format!("{:.3}-{:.3}", lo, hi))
            .unwrap_or_default();

        let mut spans = vec![Span::styled(
            format!("{:>w$} ", label, w = LABEL_W - 1),
            Style::default().fg(COL_DIM),
        )];
        for strategy in Strategy::ALL {
            let frac = app
                .histogram(strategy)
                .map(|h| h.fraction(bin))
                .unwrap_or(0.0);
            spans.push(Span::raw("\u{2502}"));
            spans.extend(render_bar(frac, max_frac, bar_w, strategy_color(strategy)));
            spans.push(Span::raw("\u{2502}"));
        }

        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    f.render_widget(paragraph, inner);
}

/// One row of the timing table: a value per strategy, in
/// [`Strategy::ALL`] order.
struct SummaryRow {
    label: &'static str,
    values: [f64; 3],
    lower_is_better: bool,
}

impl SummaryRow {
    /// Values as printed: thousands-grouped rates or milliseconds.
    fn cells(&self) -> [String; 3] {
        self.values.map(|v| {
            if self.label == "samples/s" {
                format_int(v)
            } else {
                format!("{:.2} ms", v)
            }
        })
    }

    /// Change of the queued pipeline against the coarse-lock baseline.
    fn delta(&self) -> f64 {
        delta_pct(
            self.values[Strategy::Queued.index()],
            self.values[Strategy::Partitioned.index()],
        )
    }
}

/// Rows of the timing table. `detailed` adds min, max and stddev.
fn summary_rows(app: &App, detailed: bool) -> Vec<SummaryRow> {
    let zero = StatResult::default();
    let stats = Strategy::ALL.map(|s| app.result(s).unwrap_or(&zero));
    let samples = app.config.target_count;
    let row = |label: &'static str, lower_is_better: bool, value: fn(&StatResult, u64) -> f64| {
        SummaryRow {
            label,
            values: stats.map(|st| value(st, samples)),
            lower_is_better,
        }
    };

    let mut rows = vec![
        row("mean", true, |st, _| st.mean / 1e6),
        row("trimmed", true, |st, _| st.trimmed_mean / 1e6),
        row("median", true, |st, _| st.median / 1e6),
        row("samples/s", false, |st, n| st.samples_per_sec(n)),
    ];
    if detailed {
        rows.push(row("min", true, |st, _| st.min as f64 / 1e6));
        rows.push(row("max", true, |st, _| st.max as f64 / 1e6));
        rows.push(row("stddev", true, |st, _| st.stddev / 1e6));
    }
    rows
}

fn delta_pct(value: f64, baseline: f64) -> f64 {
    if baseline != 0.0 {
        (value - baseline) / baseline * 100.0
    } else {
        0.0
    }
}

fn draw_summary(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Summary ")
        .title_style(Style::default().fg(COL_LABEL))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.results.iter().all(Option::is_none) {
        let msg = if app.finished {
            "No timing data available"
        } else {
            "Waiting for results..."
        };
        let p = Paragraph::new(Line::from(Span::styled(msg, Style::default().fg(COL_DIM))));
        f.render_widget(p, inner);
        return;
    }

    let mut header = vec![Span::styled(format!("{:>10}", ""), Style::default())];
    for strategy in Strategy::ALL {
        header.push(Span::styled(
            format!("{:>14}", strategy.label().to_uppercase()),
            Style::default()
                .fg(strategy_color(strategy))
                .add_modifier(Modifier::BOLD),
        ));
    }
    header.push(Span::styled(
        format!("{:>14}", "\u{0394} vs coarse"),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    let mut lines = vec![Line::from(header)];

    for row in summary_rows(app, false) {
        let delta = row.delta();
        let is_better = if row.lower_is_better {
            delta < 0.0
        } else {
            delta > 0.0
        };
        let delta_color = if is_better { COL_BETTER } else { COL_WORSE };
        let arrow = if delta < 0.0 { "\u{25bc}" } else { "\u{25b2}" };

        let mut spans = vec![Span::styled(
            format!("{:>10}", row.label),
            Style::default().fg(Color::White),
        )];
        for (strategy, cell) in Strategy::ALL.into_iter().zip(row.cells()) {
            spans.push(Span::styled(
                format!("{:>14}", cell),
                Style::default().fg(strategy_color(strategy)),
            ));
        }
        spans.push(Span::styled(
            format!("{:>+10.1}% {}", delta, arrow),
            Style::default()
                .fg(delta_color)
                .add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    f.render_widget(paragraph, inner);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    let text = if app.finished {
        "Press q to exit"
    } else {
        "Press q to abort"
    };
    let p = Paragraph::new(Line::from(Span::styled(text, Style::default().fg(COL_DIM))))
        .alignment(ratatui::layout::Alignment::Center);
    f.render_widget(p, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn render_bar(frac: f64, max_frac: f64, width: usize, color: Color) -> Vec<Span<'static>> {
    if max_frac <= 0.0 || width == 0 {
        return vec![Span::raw(" ".repeat(width))];
    }
    let filled = ((frac / max_frac) * width as f64).round() as usize;
    let filled = filled.min(width);
    let empty = width - filled;

    let pct = if frac > 0.001 {
        format!("{:>4.1}%", frac * 100.0)
    } else {
        "     ".to_string()
    };

    if filled >= pct.len() + 1 {
        // Draw percentage inside the bar
        let before = filled - pct.len() - 1;
        vec![
            Span::styled("\u{2588}".repeat(before + 1), Style::default().fg(color)),
            Span::styled(pct, Style::default().fg(Color::Black).bg(color)),
            Span::styled(" ".repeat(empty), Style::default().fg(COL_DIM)),
        ]
    } else {
        vec![
            Span::styled("\u{2588}".repeat(filled), Style::default().fg(color)),
            Span::styled(" ".repeat(empty), Style::default().fg(COL_DIM)),
        ]
    }
}

fn max_histogram_frac(histograms: &[Option<BinSnapshot>]) -> f64 {
    histograms
        .iter()
        .flatten()
        .flat_map(|h| (0..h.counts.len()).map(move |i| h.fraction(i)))
        .fold(0.0_f64, f64::max)
}

fn center_pad(s: &str, width: usize) -> String {
    if s.len() >= width {
        return s[..width].to_string();
    }
    let pad = (width - s.len()) / 2;
    format!(
        "{}{}{}",
        " ".repeat(pad),
        s,
        " ".repeat(width - pad - s.len())
    )
}

fn format_int(v: f64) -> String {
    let v = v as u64;
    if v >= 1_000_000 {
        format!(
            "{},{:03},{:03}",
            v / 1_000_000,
            (v / 1_000) % 1_000,
            v % 1_000
        )
    } else if v >= 1_000 {
        format!("{},{:03}", v / 1_000, v % 1_000)
    } else {
        format!("{}", v)
    }
}

// ---------------------------------------------------------------------------
// Plain-text summary (printed after TUI exits)
// ---------------------------------------------------------------------------

/// One `lo-hi:<TAB>XXXX` line per bin, the largest bin scaled to
/// `TEXT_BAR_SCALE` marks.
pub fn text_histogram(hist: &BinSnapshot) -> String {
    let mut out = String::new();
    for ((lo, hi), marks) in hist.ranges().zip(hist.normalized(TEXT_BAR_SCALE)) {
        out.push_str(&format!("{:.3}-{:.3}:\t{}\n", lo, hi, "X".repeat(marks as usize)));
    }
    out
}

pub fn print_summary(app: &App) {
    let cfg = &app.config;
    println!();
    println!("=== Histogram Pipeline Benchmark Results ===");
    println!("CPU: {} ({} CPUs)", app.system.cpu_model, app.system.ncpus);
    println!(
        "Config: {} producers, {} consumers, queue {}, {} bins in [{}, {}), {:?} retry, {} samples",
        cfg.producer_count,
        cfg.consumer_count,
        cfg.queue_capacity,
        cfg.bin_count,
        cfg.min_measurement,
        cfg.max_measurement,
        cfg.retry,
        cfg.target_count,
    );
    if let Some(ref cal) = app.calibration {
        println!(
            "Calibrated: {} samples (probe: {} samples/s)",
            cal.target_count,
            format_int(cal.probe_samples_per_sec),
        );
    }

    for strategy in Strategy::ALL {
        if let Some(hist) = app.histogram(strategy) {
            println!();
            println!("[{}] {} samples", strategy.label(), hist.total());
            print!("{}", text_histogram(hist));
        }
    }

    if app.results.iter().all(Option::is_none) {
        println!();
        return;
    }
    println!();
    println!(
        "{:>10} {:>14} {:>14} {:>14} {:>14}",
        "", "QUEUED", "DIRECT", "PARTITIONED", "Δ vs coarse"
    );
    for row in summary_rows(app, true) {
        let [q, d, p] = row.cells();
        println!(
            "{:>10} {:>14} {:>14} {:>14} {:>+13.1}%",
            row.label,
            q,
            d,
            p,
            row.delta()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn text_histogram_scales_to_largest_bin() {
        let hist = BinSnapshot {
            min: 0.0,
            maxes: vec![1.0, 2.0],
            counts: vec![5, 10],
        };
        let text = text_histogram(&hist);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("0.000-1.000:\t{}", "X".repeat(50)));
        assert_eq!(lines[1], format!("1.000-2.000:\t{}", "X".repeat(100)));
    }

    #[test]
    fn format_int_groups_thousands() {
        assert_eq!(format_int(999.0), "999");
        assert_eq!(format_int(12_345.0), "12,345");
        assert_eq!(format_int(1_002_003.0), "1,002,003");
    }

    #[test]
    fn center_pad_truncates_and_centers() {
        assert_eq!(center_pad("ab", 6), "  ab  ");
        assert_eq!(center_pad("abcdef", 3), "abc");
    }

    #[test]
    fn bar_is_blank_without_data() {
        let spans = render_bar(0.5, 0.0, 4, COL_QUEUED);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "    ");
    }

    #[test]
    fn max_fraction_spans_every_histogram() {
        let snap = |counts: Vec<u64>| BinSnapshot {
            min: 0.0,
            maxes: vec![1.0, 2.0],
            counts,
        };
        let all = [Some(snap(vec![1, 3])), None, Some(snap(vec![4, 0]))];
        assert_eq!(max_histogram_frac(&all), 1.0);
        assert_eq!(max_histogram_frac(&all[..2]), 0.75);
        assert_eq!(max_histogram_frac(&[None, None]), 0.0);
    }

    #[test]
    fn summary_compares_queued_against_coarse_lock_baseline() {
        let config = PipelineConfig {
            target_count: 1_000,
            ..PipelineConfig::default()
        };
        let mut app = App::new(SystemInfo::detect(), config);
        let round = |millis| StatResult::from_durations(&[Duration::from_millis(millis)]);
        app.record(Strategy::Queued, BinSnapshot::default(), round(30));
        app.record(Strategy::Partitioned, BinSnapshot::default(), round(60));

        let rows = summary_rows(&app, false);
        let mean = &rows[0];
        assert_eq!(mean.label, "mean");
        assert_eq!(mean.values, [30.0, 0.0, 60.0]);
        assert_eq!(mean.delta(), -50.0);
        assert_eq!(mean.cells()[0], "30.00 ms");
        let rate = rows.iter().find(|r| r.label == "samples/s").unwrap();
        assert_eq!(rate.cells()[2], "16,666");
        assert_eq!(summary_rows(&app, true).len(), rows.len() + 3);
    }
}
