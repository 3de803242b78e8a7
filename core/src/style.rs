use std::collections::BTreeMap;

use colored::{Color, Colorize};
use lazy_regex::regex;
use strum::IntoEnumIterator as _;

use crate::testing::{DiffPreview, JudgeCode, Verdict};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

/// Decoration applied to report text. Verdict logic never depends on it.
pub trait Highlight {
    fn label(&self, s: &str) -> String;
    fn judge(&self, code: JudgeCode) -> String;
    fn border(&self, s: &str) -> String;
    fn success(&self, s: &str) -> String;
    fn failure(&self, s: &str) -> String;
    fn dimmed(&self, s: &str) -> String;
}

/// ANSI colors via `colored`; truecolor when the terminal advertises it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Colorful;

/// No escape sequences at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug | Trace => Color::BrightBlack,
        }
    }
}

impl ColorTheme for JudgeCode {
    fn color(&self) -> Color {
        use JudgeCode::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Red,
                TLE => Color::Yellow,
                RTE => Color::Magenta,
                FAIL => Color::BrightRed,
            };
        }

        match self {
            AC => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            WA => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            TLE => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            RTE => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
            FAIL => Color::TrueColor {
                r: 255,
                g: 64,
                b: 96,
            },
        }
    }
}

impl Highlight for Colorful {
    fn label(&self, s: &str) -> String {
        s.blue().bold().to_string()
    }

    fn judge(&self, code: JudgeCode) -> String {
        let fg = if is_truecolor_supported() {
            Color::TrueColor {
                r: 255,
                g: 255,
                b: 255,
            }
        } else {
            Color::BrightBlack
        };
        format!(" {} ", code)
            .on_color(code.color())
            .bold()
            .color(fg)
            .to_string()
    }

    fn border(&self, s: &str) -> String {
        s.blue().to_string()
    }

    fn success(&self, s: &str) -> String {
        s.green().to_string()
    }

    fn failure(&self, s: &str) -> String {
        s.bright_red().to_string()
    }

    fn dimmed(&self, s: &str) -> String {
        s.dimmed().to_string()
    }
}

impl Highlight for Plain {
    fn label(&self, s: &str) -> String {
        s.to_owned()
    }

    fn judge(&self, code: JudgeCode) -> String {
        code.to_string()
    }

    fn border(&self, s: &str) -> String {
        s.to_owned()
    }

    fn success(&self, s: &str) -> String {
        s.to_owned()
    }

    fn failure(&self, s: &str) -> String {
        s.to_owned()
    }

    fn dimmed(&self, s: &str) -> String {
        s.to_owned()
    }
}

const CELL_MAX_WIDTH: usize = 40;
const TAB: &str = "    ";

/// Number of terminal columns `s` occupies, ignoring ANSI escapes.
pub fn visible_width(s: &str) -> usize {
    regex!(r"\x1b\[[0-9;]*m").replace_all(s, "").chars().count()
}

/// Renders one verdict as a bordered block:
///
/// ```text
/// ┏━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┓
/// ┃ Test: #4    Verdict: WA    Time: 32ms         ┃
/// ┃ Checker Log: wrong answer expected 3, found 4 ┃
/// ┃   INPUT   │ EXPECTED │ OUTPUT                 ┃
/// ┃ ──────────┼──────────┼───────                 ┃
/// ┃ 5 3       │ 3        │ 4                      ┃
/// ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛
/// ```
pub fn render(v: &Verdict, hl: &dyn Highlight) -> String {
    let mut lines = vec![format!(
        "{} #{}    {} {}    {} {}ms",
        hl.label("Test:"),
        v.index(),
        hl.label("Verdict:"),
        hl.judge(v.code()),
        hl.label("Time:"),
        v.elapsed().as_millis(),
    )];

    if let Some(log) = v.fail_log() {
        push_inline(&mut lines, &hl.label("Fail:"), log);
    }
    if let Some(stderr) = v.stderr_log() {
        lines.push(hl.label("Stderr:"));
        lines.extend(text_lines(stderr));
    }
    if let Some(log) = v.checker_log() {
        push_inline(&mut lines, &hl.label("Checker Log:"), log);
    }
    if let Some(diff) = v.diff() {
        lines.extend(diff_table(diff, hl));
    }

    boxed(&lines, hl)
}

/// One-line summary of a whole run.
pub fn render_summary(verdicts: &[Verdict], hl: &dyn Highlight) -> String {
    let bar = "-".repeat(5);

    let count: BTreeMap<JudgeCode, usize> = verdicts.iter().fold(BTreeMap::new(), |mut m, v| {
        *m.entry(v.code()).or_default() += 1;
        m
    });

    let num_total = verdicts.len();
    let num_passed = count.get(&JudgeCode::AC).copied().unwrap_or(0);
    let num_failed = num_total - num_passed;

    let body = if num_passed == num_total {
        hl.success(&format!("All {} tests passed ✨", num_total))
    } else {
        let summary_msg = if num_passed > 0 {
            format!("{}/{} tests failed 💣", num_failed, num_total)
        } else {
            format!("All {} tests failed 💀", num_total)
        };
        let detail_msg = JudgeCode::iter()
            .filter(|&code| code != JudgeCode::AC)
            .filter_map(|code| count.get(&code).map(|&n| (code, n)))
            .map(|(code, n)| format!("{}{}{}", hl.judge(code), hl.dimmed("x"), n))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({})", hl.failure(&summary_msg), detail_msg)
    };

    format!("{} {} {}", bar, body, bar)
}

fn text_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.trim_end()
        .lines()
        .map(|line| line.trim_end_matches('\r').replace('\t', TAB))
}

fn push_inline(lines: &mut Vec<String>, label: &str, text: &str) {
    let mut rest = text_lines(text);
    match rest.next() {
        Some(first) => lines.push(format!("{} {}", label, first)),
        None => lines.push(label.to_owned()),
    }
    lines.extend(rest);
}

fn wrap_cell(text: &str) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.trim_end_matches('\r').replace('\t', TAB).chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        rows.extend(chars.chunks(CELL_MAX_WIDTH).map(|c| c.iter().collect()));
    }
    // A trailing newline is not worth an empty row.
    if rows.len() > 1 && rows.last().map_or(false, String::is_empty) {
        rows.pop();
    }
    rows
}

fn diff_table(diff: &DiffPreview, hl: &dyn Highlight) -> Vec<String> {
    const HEADERS: [&str; 3] = ["INPUT", "EXPECTED", "OUTPUT"];
    let cells = [
        wrap_cell(&diff.input),
        wrap_cell(&diff.expected),
        wrap_cell(&diff.output),
    ];

    let widths: Vec<usize> = HEADERS
        .iter()
        .zip(&cells)
        .map(|(h, rows)| {
            rows.iter()
                .map(|r| r.chars().count())
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let num_rows = cells.iter().map(Vec::len).max().unwrap_or(0);

    let mut lines = Vec::with_capacity(num_rows + 2);
    lines.push(
        HEADERS
            .iter()
            .zip(&widths)
            .map(|(h, &w)| hl.label(&format!("{:^w$}", h, w = w)))
            .collect::<Vec<_>>()
            .join(" │ "),
    );
    lines.push(
        widths
            .iter()
            .map(|&w| "─".repeat(w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    for r in 0..num_rows {
        let row = cells
            .iter()
            .zip(&widths)
            .map(|(rows, &w)| {
                let cell = rows.get(r).map(String::as_str).unwrap_or("");
                format!("{}{}", cell, " ".repeat(w - cell.chars().count()))
            })
            .collect::<Vec<_>>()
            .join(" │ ");
        lines.push(row.trim_end().to_owned());
    }
    lines
}

fn boxed(lines: &[String], hl: &dyn Highlight) -> String {
    let width = lines.iter().map(|l| visible_width(l)).max().unwrap_or(0);
    let horizontal = "━".repeat(width + 2);

    let mut out = hl.border(&format!("┏{}┓", horizontal));
    out.push('\n');
    for line in lines {
        let pad = " ".repeat(width - visible_width(line));
        out += &format!("{} {}{} {}\n", hl.border("┃"), line, pad, hl.border("┃"));
    }
    out += &hl.border(&format!("┗{}┛", horizontal));
    out
}
