use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_date;
use crate::display::{date_line, offset_label};
use crate::locale::Localizer;
use crate::record::DayOffsetRecord;
use crate::slots::SlotIndex;
use crate::timeline::WidgetEntry;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Main view: the offset label over the already computed target date.
    pub fn print_offset(
        &mut self,
        record: &DayOffsetRecord,
        target: NaiveDate,
        loc: &Localizer<'_>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", offset_label(record, loc))?;
        writeln!(
            out,
            "{}",
            self.paint(&format_date(target, loc.effective_locale()), "1")
        )?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(count = records.len()))]
    pub fn print_pinned_table(
        &mut self,
        records: &[DayOffsetRecord],
        today: NaiveDate,
        loc: &Localizer<'_>,
    ) -> anyhow::Result<()> {
        let rows = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    offset_label(record, loc),
                    date_line(record, today, loc),
                ]
            })
            .collect();

        write_table(
            io::stdout().lock(),
            vec!["#".to_string(), "Offset".to_string(), "Date".to_string()],
            rows,
        )
    }

    #[tracing::instrument(skip_all)]
    pub fn print_slot_table(
        &mut self,
        slots: &[DayOffsetRecord],
        today: NaiveDate,
        loc: &Localizer<'_>,
    ) -> anyhow::Result<()> {
        let rows = SlotIndex::ALL
            .iter()
            .zip(slots)
            .map(|(index, record)| {
                vec![
                    self.paint(&index.to_string(), "33"),
                    offset_label(record, loc),
                    date_line(record, today, loc),
                ]
            })
            .collect();

        write_table(
            io::stdout().lock(),
            vec!["Slot".to_string(), "Offset".to_string(), "Date".to_string()],
            rows,
        )
    }

    #[tracing::instrument(skip_all, fields(count = entries.len()))]
    pub fn print_widget_entries(&mut self, entries: &[WidgetEntry]) -> anyhow::Result<()> {
        let rows = entries
            .iter()
            .map(|entry| {
                vec![
                    self.paint(
                        &entry
                            .slot
                            .map(|slot| slot.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        "33",
                    ),
                    entry.compact.clone(),
                    entry.inline.clone(),
                    entry.date_text.clone(),
                ]
            })
            .collect();

        write_table(
            io::stdout().lock(),
            vec![
                "Slot".to_string(),
                "Compact".to_string(),
                "Inline".to_string(),
                "Date".to_string(),
            ],
            rows,
        )
    }

    pub fn print_message(&mut self, message: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{message}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{}{} ", header, pad(header, *width))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{}{} ", cell, pad(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    " ".repeat(width.saturating_sub(visible_width))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{strip_ansi, write_table};

    #[test]
    fn aligns_wide_characters() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["#".to_string(), "Offset".to_string()],
            vec![
                vec!["1".to_string(), "5 日目".to_string()],
                vec!["\x1b[33m2\x1b[0m".to_string(), "3 days later".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Offset       ");
        assert_eq!(lines[1], "- ------------ ");
        assert_eq!(lines[2], "1 5 日目       ");
        assert_eq!(strip_ansi(lines[3]), "2 3 days later ");
    }
}
