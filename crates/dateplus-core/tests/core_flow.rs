use chrono::{NaiveDate, TimeZone};
use chrono_tz::Asia::Tokyo;
use dateplus_core::datetime::{compute_target_date, format_date, format_ordinal_or_plain};
use dateplus_core::display::render_offset_label;
use dateplus_core::locale::LocaleTable;
use dateplus_core::pinned::PinnedStore;
use dateplus_core::record::DayOffsetRecord;
use dateplus_core::slots::{SlotIndex, SlotStore};
use dateplus_core::storage::Namespaces;
use dateplus_core::timeline::WidgetTimeline;
use tempfile::tempdir;

#[test]
fn pinned_and_slot_stores_survive_reopening() {
    let temp = tempdir().expect("tempdir");

    {
        let spaces = Namespaces::open(temp.path(), "group.dateplus").expect("open namespaces");
        let pinned = PinnedStore::new(&spaces.app);
        pinned.add(5, true).expect("pin 5th day");
        assert!(pinned.exists(5, true));

        let (_, added) = pinned.add_if_absent(5, true).expect("add_if_absent");
        assert!(!added);

        let slots = SlotStore::new(&spaces.group);
        slots
            .register_slot_number(2, &DayOffsetRecord::new(10, false))
            .expect("register slot 2");
        assert!(slots.register_slot_number(4, &DayOffsetRecord::new(1, false)).is_err());
    }

    let spaces = Namespaces::open(temp.path(), "group.dateplus").expect("reopen namespaces");
    let pinned = PinnedStore::new(&spaces.app);
    let loaded = pinned.load();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.contains(5, true));

    pinned.remove(5, true).expect("remove");
    assert!(!pinned.exists(5, true));

    let slots = SlotStore::new(&spaces.group);
    let two = SlotIndex::new(2).expect("slot 2");
    assert_eq!(slots.read_slot(two), DayOffsetRecord::new(10, false));
    for number in [1, 3] {
        let index = SlotIndex::new(number).expect("slot index");
        assert_eq!(slots.read_slot(index), DayOffsetRecord::slot_default());
    }
}

#[test]
fn month_rollover_and_localized_output() {
    let table = LocaleTable::builtin();
    let reference = Tokyo
        .with_ymd_and_hms(2024, 1, 31, 8, 15, 0)
        .single()
        .expect("valid reference");

    let target = compute_target_date(&reference, 1, false);
    let day = target.date_naive();
    assert_eq!(day, NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"));
    assert_eq!(format_date(day, "ja"), "2024年2月1日 (木)");
    assert_eq!(format_date(day, "en"), "Thu, February 1, 2024");

    assert_eq!(compute_target_date(&reference, 1, true), reference);
    assert_eq!(
        compute_target_date(&reference, 30, true),
        compute_target_date(&reference, 29, false)
    );

    assert_eq!(
        render_offset_label(&DayOffsetRecord::new(1, false), "en", &table),
        "1 day later"
    );
    assert_eq!(
        render_offset_label(&DayOffsetRecord::new(2, false), "en", &table),
        "2 days later"
    );
    assert_eq!(format_ordinal_or_plain(21, "en"), "21th");
}

#[test]
fn widget_timeline_reads_shared_slots() {
    let temp = tempdir().expect("tempdir");
    let spaces = Namespaces::open(temp.path(), "group.dateplus").expect("open namespaces");
    let slots = SlotStore::new(&spaces.group);
    slots
        .register_slot_number(3, &DayOffsetRecord::new(7, true))
        .expect("register slot 3");

    let table = LocaleTable::builtin();
    let now = Tokyo
        .with_ymd_and_hms(2024, 1, 31, 23, 30, 0)
        .single()
        .expect("valid now");
    let timeline = WidgetTimeline::build(&slots.read_all_slots(), &now, &table.localizer("en"));

    assert_eq!(timeline.entries.len(), 3);
    assert_eq!(timeline.entries[2].slot, Some(3));
    assert_eq!(timeline.entries[2].label, "7th day");
    assert_eq!(
        timeline.entries[2].target,
        NaiveDate::from_ymd_opt(2024, 2, 6).expect("date")
    );
    assert_eq!(
        timeline.reload_at,
        Tokyo
            .with_ymd_and_hms(2024, 2, 1, 0, 0, 0)
            .single()
            .expect("midnight")
    );
}

#[test]
fn slots_keep_their_copy_after_unpinning() {
    let temp = tempdir().expect("tempdir");
    let spaces = Namespaces::open(temp.path(), "group.dateplus").expect("open namespaces");
    let pinned = PinnedStore::new(&spaces.app);
    let slots = SlotStore::new(&spaces.group);

    let (_, added) = pinned.add_if_absent(14, true).expect("pin");
    assert!(added);
    let chosen = pinned.load().records()[0].clone();
    let index = SlotIndex::new(1).expect("slot 1");
    slots.register_slot(index, &chosen).expect("register pinned offset");

    pinned.remove(14, true).expect("unpin");
    assert!(pinned.load().is_empty());

    let kept = slots.read_slot(index);
    assert_eq!(kept, DayOffsetRecord::new(14, true));
    assert_eq!(kept.id(), chosen.id());
}
