use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;

use crate::datetime::{compute_target_day, format_date, next_local_midnight};
use crate::display::{compact_label, inline_line, offset_label};
use crate::locale::Localizer;
use crate::record::DayOffsetRecord;
use crate::slots::{SLOT_COUNT, SlotIndex};

/// What one widget slot shows until the next reload.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetEntry {
    pub slot: Option<u8>,
    pub days: u32,
    pub include_first_day: bool,
    pub target: NaiveDate,
    pub label: String,
    pub compact: String,
    pub inline: String,
    pub date_text: String,
}

impl WidgetEntry {
    fn build(slot: Option<SlotIndex>, record: &DayOffsetRecord, today: NaiveDate, loc: &Localizer<'_>) -> Self {
        let target = compute_target_day(today, record.days(), record.include_first_day());
        Self {
            slot: slot.map(SlotIndex::number),
            days: record.days(),
            include_first_day: record.include_first_day(),
            target,
            label: offset_label(record, loc),
            compact: compact_label(record, loc),
            inline: inline_line(record, today, loc),
            date_text: format_date(target, loc.effective_locale()),
        }
    }
}

/// Entries for every slot plus the instant the widget should reload:
/// the next local midnight.
#[derive(Debug, Clone)]
pub struct WidgetTimeline<Z: TimeZone> {
    pub entries: Vec<WidgetEntry>,
    pub reload_at: DateTime<Z>,
}

impl<Z: TimeZone> WidgetTimeline<Z> {
    #[tracing::instrument(skip_all)]
    pub fn build(slots: &[DayOffsetRecord; SLOT_COUNT], now: &DateTime<Z>, loc: &Localizer<'_>) -> Self {
        let today = now.naive_local().date();
        let entries = SlotIndex::ALL
            .iter()
            .zip(slots)
            .map(|(index, record)| WidgetEntry::build(Some(*index), record, today, loc))
            .collect();
        let reload_at = next_local_midnight(now);
        tracing::debug!(reload_at = ?reload_at.naive_local(), "built widget timeline");
        Self { entries, reload_at }
    }

    /// Shown while a widget has no data yet.
    pub fn placeholder(now: &DateTime<Z>, loc: &Localizer<'_>) -> Self {
        let today = now.naive_local().date();
        Self {
            entries: vec![WidgetEntry::build(None, &DayOffsetRecord::new(0, false), today, loc)],
            reload_at: now.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Timelike};
    use chrono_tz::Asia::Tokyo;

    use super::WidgetTimeline;
    use crate::locale::LocaleTable;
    use crate::record::DayOffsetRecord;

    #[test]
    fn builds_one_entry_per_slot() {
        let table = LocaleTable::builtin();
        let loc = table.localizer("en");
        let now = Tokyo
            .with_ymd_and_hms(2024, 1, 31, 23, 15, 0)
            .single()
            .expect("valid now");
        let slots = [
            DayOffsetRecord::new(1, true),
            DayOffsetRecord::new(1, false),
            DayOffsetRecord::new(30, false),
        ];

        let timeline = WidgetTimeline::build(&slots, &now, &loc);

        assert_eq!(timeline.entries.len(), 3);
        let first = &timeline.entries[0];
        assert_eq!(first.slot, Some(1));
        assert_eq!(first.target, NaiveDate::from_ymd_opt(2024, 1, 31).expect("date"));
        assert_eq!(first.label, "1st day");

        let second = &timeline.entries[1];
        assert_eq!(second.inline, "Feb 1 ( 1 day later )");
        assert_eq!(second.compact, "(1D L)");
        assert_eq!(second.date_text, "Thu, February 1, 2024");

        assert_eq!(
            timeline.entries[2].target,
            NaiveDate::from_ymd_opt(2024, 3, 1).expect("date")
        );

        assert_eq!(
            timeline.reload_at.date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 1).expect("date")
        );
        assert_eq!(timeline.reload_at.hour(), 0);
    }

    #[test]
    fn placeholder_reloads_immediately() {
        let table = LocaleTable::builtin();
        let loc = table.localizer("ja");
        let now = Tokyo
            .with_ymd_and_hms(2024, 2, 1, 8, 0, 0)
            .single()
            .expect("valid now");
        let timeline = WidgetTimeline::placeholder(&now, &loc);
        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.entries[0].slot, None);
        assert_eq!(timeline.entries[0].label, "0 日後");
        assert_eq!(timeline.reload_at, now);
    }
}
