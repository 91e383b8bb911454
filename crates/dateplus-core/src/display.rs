//! Strings shown for a day offset on each surface.

use chrono::NaiveDate;

use crate::datetime::{compute_target_day, format_date, format_ordinal_or_plain, format_widget_date};
use crate::locale::{LocaleTable, LocalizedKey, Localizer};
use crate::record::DayOffsetRecord;

/// "5th day", "3 days later", "5 日目", ...
pub fn render_offset_label(
    record: &DayOffsetRecord,
    locale_code: &str,
    table: &LocaleTable,
) -> String {
    offset_label(record, &table.localizer(locale_code))
}

pub fn offset_label(record: &DayOffsetRecord, loc: &Localizer<'_>) -> String {
    let locale = loc.effective_locale();
    if record.include_first_day() {
        return format!(
            "{} {}",
            format_ordinal_or_plain(record.days(), locale),
            loc.localize(LocalizedKey::Day)
        );
    }

    // English is the only locale with a singular form.
    if locale == "en" && record.days() == 1 {
        return "1 day later".to_string();
    }
    format!(
        "{} {}",
        record.days(),
        loc.localize(LocalizedKey::DaysLater)
    )
}

/// Abbreviated label for small widgets: "(5D)", "(3D L)", "(5日目)".
pub fn render_compact_label(
    record: &DayOffsetRecord,
    locale_code: &str,
    table: &LocaleTable,
) -> String {
    compact_label(record, &table.localizer(locale_code))
}

pub fn compact_label(record: &DayOffsetRecord, loc: &Localizer<'_>) -> String {
    let key = if record.include_first_day() {
        LocalizedKey::WidgetDay
    } else {
        LocalizedKey::WidgetDaysLater
    };
    format!("({}{})", record.days(), loc.localize(key))
}

pub fn render_date_line(
    record: &DayOffsetRecord,
    reference: NaiveDate,
    locale_code: &str,
    table: &LocaleTable,
) -> String {
    date_line(record, reference, &table.localizer(locale_code))
}

pub fn date_line(record: &DayOffsetRecord, reference: NaiveDate, loc: &Localizer<'_>) -> String {
    let target = compute_target_day(reference, record.days(), record.include_first_day());
    format_date(target, loc.effective_locale())
}

/// Single-line widget text: "Feb 1 ( 1 day later )".
pub fn render_inline(
    record: &DayOffsetRecord,
    reference: NaiveDate,
    locale_code: &str,
    table: &LocaleTable,
) -> String {
    inline_line(record, reference, &table.localizer(locale_code))
}

pub fn inline_line(record: &DayOffsetRecord, reference: NaiveDate, loc: &Localizer<'_>) -> String {
    let target = compute_target_day(reference, record.days(), record.include_first_day());
    format!(
        "{} ( {} )",
        format_widget_date(target, loc.effective_locale()),
        offset_label(record, loc)
    )
}
