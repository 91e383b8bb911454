use std::fmt;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{calendar_now, compute_target_date, parse_reference_date};
use crate::deeplink::DeepLink;
use crate::display::offset_label;
use crate::hooks::HookRunner;
use crate::locale::{LocaleTable, LocalizedKey, Localizer};
use crate::pinned::PinnedStore;
use crate::record::DayOffsetRecord;
use crate::render::Renderer;
use crate::slots::{SlotIndex, SlotStore};
use crate::storage::Namespaces;
use crate::timeline::WidgetTimeline;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "calc", "pin", "unpin", "pins", "slot", "slots", "widget", "open", "_show", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs besides its arguments.
struct Session<'a, Z: TimeZone> {
    spaces: &'a Namespaces,
    cfg: &'a Config,
    loc: Localizer<'a>,
    hooks: HookRunner,
    now: DateTime<Z>,
}

#[instrument(skip(spaces, cfg, table, renderer, inv))]
pub fn dispatch(
    spaces: &Namespaces,
    cfg: &Config,
    table: &LocaleTable,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    match calendar_now() {
        Some(now) => dispatch_at(spaces, cfg, table, renderer, inv, now),
        None => dispatch_at(spaces, cfg, table, renderer, inv, Local::now()),
    }
}

fn dispatch_at<Z>(
    spaces: &Namespaces,
    cfg: &Config,
    table: &LocaleTable,
    renderer: &mut Renderer,
    inv: Invocation,
    now: DateTime<Z>,
) -> anyhow::Result<()>
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    let locale = cfg.locale();
    let session = Session {
        spaces,
        cfg,
        loc: table.localizer(&locale),
        hooks: HookRunner::new(cfg, &spaces.data_dir),
        now,
    };
    let command = inv.command.as_str();
    let args = &inv.command_args;

    debug!(
        command,
        args = ?args,
        locale = %locale,
        effective_locale = session.loc.effective_locale(),
        "dispatching command"
    );

    match command {
        "calc" => cmd_calc(&session, renderer, args),
        "pin" => cmd_pin(&session, renderer, args),
        "unpin" => cmd_unpin(&session, renderer, args),
        "pins" => cmd_pins(&session, renderer, args),
        "slot" => cmd_slot(&session, renderer, args),
        "slots" => cmd_slots(&session, renderer),
        "widget" => cmd_widget(&session, renderer, args),
        "open" => cmd_open(&session, renderer, args),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("dateplus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Day count and modifiers shared by the offset commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct OffsetArgs {
    days: Option<u32>,
    first: Option<bool>,
    from: Option<String>,
}

impl OffsetArgs {
    fn record(&self, cfg: &Config) -> anyhow::Result<DayOffsetRecord> {
        let days = match self.days {
            Some(days) => days,
            None => cfg.get_u32("default.days")?.unwrap_or(1),
        };
        let first = self
            .first
            .or_else(|| cfg.get_bool("default.first"))
            .unwrap_or(false);
        Ok(DayOffsetRecord::new(days, first))
    }

    fn require_days(&self, command: &str) -> anyhow::Result<u32> {
        self.days
            .ok_or_else(|| anyhow!("{command} requires a day count"))
    }

    fn reference<Z: TimeZone>(&self, now: &DateTime<Z>) -> anyhow::Result<DateTime<Z>> {
        match &self.from {
            Some(expr) => parse_reference_date(expr, now)
                .with_context(|| format!("invalid from: date {expr}")),
            None => Ok(now.clone()),
        }
    }
}

#[instrument(skip(args))]
fn parse_offset_args(args: &[String]) -> anyhow::Result<OffsetArgs> {
    let mut out = OffsetArgs::default();

    for arg in args {
        if let Some(value) = arg.strip_prefix("first:") {
            out.first = Some(parse_switch(value)?);
        } else if let Some(value) = arg.strip_prefix("from:") {
            if value.trim().is_empty() {
                return Err(anyhow!("from: needs a date"));
            }
            out.from = Some(value.to_string());
        } else if let Ok(days) = arg.parse::<u32>() {
            if out.days.replace(days).is_some() {
                return Err(anyhow!("more than one day count given"));
            }
        } else {
            return Err(anyhow!("unexpected argument: {arg}"));
        }
    }

    Ok(out)
}

fn parse_switch(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "on" | "true" | "1" => Ok(true),
        "no" | "n" | "off" | "false" | "0" => Ok(false),
        other => Err(anyhow!("expected yes or no, got: {other}")),
    }
}

#[instrument(skip(session, renderer, args))]
fn cmd_calc<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let parsed = parse_offset_args(args)?;
    let record = parsed.record(session.cfg)?;
    let reference = parsed.reference(&session.now)?;
    let target = compute_target_date(&reference, record.days(), record.include_first_day());
    info!(
        days = record.days(),
        include_first_day = record.include_first_day(),
        target = %target.naive_local(),
        "computed target date"
    );
    renderer.print_offset(&record, target.naive_local().date(), &session.loc)
}

#[instrument(skip(session, renderer, args))]
fn cmd_pin<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let parsed = parse_offset_args(args)?;
    let days = parsed.require_days("pin")?;
    let first = parsed.record(session.cfg)?.include_first_day();

    let store = PinnedStore::new(&session.spaces.app);
    let (_, was_added) = store.add_if_absent(days, first)?;
    let key = if was_added {
        LocalizedKey::Pinned
    } else {
        LocalizedKey::AlreadyRegistered
    };
    renderer.print_message(session.loc.localize(key))
}

#[instrument(skip(session, renderer, args))]
fn cmd_unpin<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let parsed = parse_offset_args(args)?;
    let days = parsed.require_days("unpin")?;
    let first = parsed.record(session.cfg)?.include_first_day();

    let store = PinnedStore::new(&session.spaces.app);
    if !store.exists(days, first) {
        warn!(days, include_first_day = first, "nothing pinned for this offset");
        return Ok(());
    }
    store.remove(days, first)?;
    let label = offset_label(&DayOffsetRecord::new(days, first), &session.loc);
    renderer.print_message(&format!(
        "{}: {label}",
        session.loc.localize(LocalizedKey::Delete)
    ))
}

#[instrument(skip(session, renderer, args))]
fn cmd_pins<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let parsed = parse_offset_args(args)?;
    if parsed.days.is_some() || parsed.first.is_some() {
        return Err(anyhow!("pins only accepts from:<date>"));
    }
    let reference = parsed.reference(&session.now)?;

    let pinned = PinnedStore::new(&session.spaces.app).load();
    if pinned.is_empty() {
        renderer.print_message(session.loc.localize(LocalizedKey::PinnedNothing))?;
        return renderer.print_message(session.loc.localize(LocalizedKey::PinnedTip));
    }

    renderer.print_message(session.loc.localize(LocalizedKey::PinList))?;
    renderer.print_pinned_table(
        pinned.records(),
        reference.naive_local().date(),
        &session.loc,
    )
}

#[instrument(skip(session, renderer, args))]
fn cmd_slot<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let Some((number, rest)) = args.split_first() else {
        return Err(anyhow!(
            "{}",
            session.loc.localize(LocalizedKey::SelectWidgetNumber)
        ));
    };
    let number: i64 = number
        .parse()
        .with_context(|| format!("slot number must be an integer, got {number}"))?;
    let index = SlotIndex::new(number)?;

    let parsed = parse_offset_args(rest)?;
    let days = parsed.require_days("slot")?;
    let first = parsed.record(session.cfg)?.include_first_day();
    let record = DayOffsetRecord::new(days, first);

    let slots = SlotStore::new(&session.spaces.group);
    slots.register_slot(index, &record)?;

    let timeline = WidgetTimeline::build(&slots.read_all_slots(), &session.now, &session.loc);
    // The slot is already stored; a failing refresh only delays the widget.
    match session.hooks.request_refresh(&timeline.entries) {
        Ok(delivered) => debug!(delivered, "requested widget refresh"),
        Err(err) => warn!(error = %format!("{err:#}"), "widget refresh request failed"),
    }

    renderer.print_message(&format!(
        "{} #{index}: {}",
        session.loc.localize(LocalizedKey::Update),
        offset_label(&record, &session.loc)
    ))
}

#[instrument(skip(session, renderer))]
fn cmd_slots<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let slots = SlotStore::new(&session.spaces.group).read_all_slots();
    renderer.print_slot_table(&slots, session.now.naive_local().date(), &session.loc)
}

#[instrument(skip(session, renderer, args))]
fn cmd_widget<Z>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()>
where
    Z: TimeZone,
    Z::Offset: fmt::Display,
{
    let parsed = parse_offset_args(args)?;
    if parsed.days.is_some() || parsed.first.is_some() {
        return Err(anyhow!("widget only accepts from:<date>"));
    }
    let reference = parsed.reference(&session.now)?;

    let slots = SlotStore::new(&session.spaces.group).read_all_slots();
    let timeline = WidgetTimeline::build(&slots, &reference, &session.loc);
    renderer.print_widget_entries(&timeline.entries)?;
    renderer.print_message(&format!(
        "reload at {}",
        timeline.reload_at.format("%Y-%m-%d %H:%M %Z")
    ))
}

#[instrument(skip(session, renderer, args))]
fn cmd_open<Z: TimeZone>(
    session: &Session<'_, Z>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let url = args
        .first()
        .ok_or_else(|| anyhow!("open requires a url"))?;

    match DeepLink::parse(url) {
        Some(DeepLink::PinnedList) => {
            info!(url = %url, "opening pinned list from deep link");
            cmd_pins(session, renderer, &[])
        }
        None => {
            debug!(url = %url, "deep link ignored");
            Ok(())
        }
    }
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: calc [<days>] [first:yes|no] [from:<date>], pin <days>, unpin <days>, pins, slot <1-3> <days>, slots, widget, open <url>, _show, version"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Asia::Tokyo;
    use tempfile::tempdir;

    use super::{OffsetArgs, dispatch_at, expand_command_abbrev, known_command_names, parse_offset_args};
    use crate::cli::Invocation;
    use crate::config::Config;
    use crate::locale::LocaleTable;
    use crate::pinned::PinnedStore;
    use crate::record::DayOffsetRecord;
    use crate::render::Renderer;
    use crate::slots::SlotStore;
    use crate::storage::Namespaces;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    fn run(spaces: &Namespaces, cfg: &Config, command: &str, args: &[&str]) -> anyhow::Result<()> {
        let now = Tokyo
            .with_ymd_and_hms(2024, 1, 31, 9, 0, 0)
            .single()
            .expect("valid now");
        let mut renderer = Renderer::new(cfg).expect("renderer");
        dispatch_at(
            spaces,
            cfg,
            &LocaleTable::builtin(),
            &mut renderer,
            Invocation {
                command: command.to_string(),
                command_args: strings(args),
            },
            now,
        )
    }

    #[test]
    fn parses_day_count_and_modifiers() {
        let parsed = parse_offset_args(&strings(&["10", "first:yes", "from:2024-01-31"]))
            .expect("parse");
        assert_eq!(
            parsed,
            OffsetArgs {
                days: Some(10),
                first: Some(true),
                from: Some("2024-01-31".to_string()),
            }
        );

        assert!(parse_offset_args(&strings(&["1", "2"])).is_err());
        assert!(parse_offset_args(&strings(&["first:maybe"])).is_err());
        assert!(parse_offset_args(&strings(&["-3"])).is_err());
        assert!(parse_offset_args(&strings(&["from:"])).is_err());
    }

    #[test]
    fn defaults_come_from_config() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("default.days".to_string(), "7".to_string()),
            ("default.first".to_string(), "yes".to_string()),
        ]);
        let record = OffsetArgs::default().record(&cfg).expect("record");
        assert_eq!(record, DayOffsetRecord::new(7, true));
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("w", &known), Some("widget"));
        assert_eq!(expand_command_abbrev("pins", &known), Some("pins"));
        assert_eq!(expand_command_abbrev("pi", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn pin_then_unpin_round_trips_through_storage() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::defaults();
        let spaces = Namespaces::open(temp.path(), &cfg.storage_group()).expect("namespaces");

        run(&spaces, &cfg, "pin", &["5", "first:yes"]).expect("pin");
        run(&spaces, &cfg, "pin", &["5", "first:yes"]).expect("pin again");
        run(&spaces, &cfg, "pin", &["3"]).expect("pin other");

        let store = PinnedStore::new(&spaces.app);
        assert_eq!(store.load().len(), 2);

        run(&spaces, &cfg, "unpin", &["5", "first:yes"]).expect("unpin");
        let remaining = store.load();
        assert_eq!(remaining.records(), &[DayOffsetRecord::new(3, false)]);

        run(&spaces, &cfg, "unpin", &["99"]).expect("unpin missing is a no-op");
        assert!(run(&spaces, &cfg, "pin", &[]).is_err());
    }

    #[test]
    fn slot_registration_validates_the_number() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::defaults();
        let spaces = Namespaces::open(temp.path(), &cfg.storage_group()).expect("namespaces");

        assert!(run(&spaces, &cfg, "slot", &["4", "10"]).is_err());
        assert!(run(&spaces, &cfg, "slot", &["0", "10"]).is_err());
        run(&spaces, &cfg, "slot", &["2", "10", "first:yes"]).expect("slot");

        let slots = SlotStore::new(&spaces.group).read_all_slots();
        assert_eq!(slots[0], DayOffsetRecord::slot_default());
        assert_eq!(slots[1], DayOffsetRecord::new(10, true));
        assert_eq!(slots[2], DayOffsetRecord::slot_default());
    }

    #[cfg(unix)]
    #[test]
    fn failing_refresh_hook_does_not_fail_slot_registration() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let hooks = temp.path().join("hooks");
        std::fs::create_dir_all(&hooks).expect("hooks dir");
        let script = hooks.join("on-refresh.fail");
        std::fs::write(&script, "#!/bin/sh\nexit 1\n").expect("write hook");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let cfg = Config::defaults();
        let spaces = Namespaces::open(temp.path(), &cfg.storage_group()).expect("namespaces");
        run(&spaces, &cfg, "slot", &["2", "10"]).expect("slot despite hook failure");

        let slots = SlotStore::new(&spaces.group).read_all_slots();
        assert_eq!(slots[1], DayOffsetRecord::new(10, false));
    }

    #[test]
    fn host_clock_sessions_use_local_calendar_days() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::defaults();
        let spaces = Namespaces::open(temp.path(), &cfg.storage_group()).expect("namespaces");
        let now = chrono::FixedOffset::east_opt(9 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 1, 31, 23, 30, 0)
            .single()
            .expect("valid now");
        let mut renderer = Renderer::new(&cfg).expect("renderer");
        dispatch_at(
            &spaces,
            &cfg,
            &LocaleTable::builtin(),
            &mut renderer,
            Invocation {
                command: "widget".to_string(),
                command_args: vec![],
            },
            now,
        )
        .expect("widget on a fixed-offset clock");
    }

    #[test]
    fn read_only_commands_succeed_on_empty_storage() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::defaults();
        let spaces = Namespaces::open(temp.path(), &cfg.storage_group()).expect("namespaces");

        run(&spaces, &cfg, "calc", &["3", "from:2024-02-28"]).expect("calc");
        run(&spaces, &cfg, "pins", &[]).expect("pins");
        run(&spaces, &cfg, "slots", &[]).expect("slots");
        run(&spaces, &cfg, "widget", &["from:tomorrow"]).expect("widget");
        run(&spaces, &cfg, "open", &["dateplus://deeplink?from=widget"]).expect("open");
        run(&spaces, &cfg, "open", &["https://example.com"]).expect("ignored link");
        assert!(run(&spaces, &cfg, "widget", &["3"]).is_err());
        assert!(run(&spaces, &cfg, "nope", &[]).is_err());
    }
}
