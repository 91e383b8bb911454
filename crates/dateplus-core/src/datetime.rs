use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "dateplus-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DATEPLUS_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DATEPLUS_TIME_CONFIG";
const SYSTEM_TIMEZONE_ENV_VAR: &str =
  "TZ";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Explicitly configured calendar
/// timezone. `None` means the host's
/// local time (`/etc/localtime`, POSIX
/// `TZ` rules and the like).
pub fn calendar_timezone()
-> Option<&'static Tz> {
  static CALENDAR_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  CALENDAR_TZ
    .get_or_init(|| {
      resolve_calendar_timezone(|key| {
        std::env::var(key).ok()
      })
    })
    .as_ref()
}

/// "Now" in the calendar zone, or
/// `None` when the host clock applies;
/// see [`calendar_timezone`].
#[must_use]
pub fn calendar_now() -> Option<DateTime<Tz>>
{
  calendar_timezone().map(|tz| {
    Utc::now().with_timezone(tz)
  })
}

fn resolve_calendar_timezone<F>(
  env: F
) -> Option<Tz>
where
  F: Fn(&str) -> Option<String>
{
  if let Some(raw) =
    env(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return Some(tz);
  }

  if let Some(path) =
    timezone_config_path(&env)
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  // Only IANA names map onto chrono-tz;
  // POSIX rule strings are left to the
  // host clock, which understands them.
  if let Some(raw) =
    env(SYSTEM_TIMEZONE_ENV_VAR)
    && let Ok(tz) = raw
      .trim()
      .trim_start_matches(':')
      .parse::<Tz>()
  {
    tracing::info!(
      timezone = %raw,
      "using TZ as calendar timezone"
    );
    return Some(tz);
  }

  tracing::info!(
    "no calendar timezone configured; \
     using host local time"
  );
  None
}

fn timezone_config_path<F>(
  env: &F
) -> Option<PathBuf>
where
  F: Fn(&str) -> Option<String>
{
  if let Some(raw) =
    env(TIMEZONE_CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Resolves a wall-clock time in `tz`.
/// A fold picks the earliest instant;
/// a gap moves forward one hour.
fn resolve_local<Z: TimeZone>(
  tz: &Z,
  local_naive: NaiveDateTime
) -> Option<DateTime<Z>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(dt) => {
      Some(dt)
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::debug!(
        local = %local_naive,
        "ambiguous local time; using earliest"
      );
      Some(if first <= second {
        first
      } else {
        second
      })
    }
    | LocalResult::None => {
      tracing::debug!(
        local = %local_naive,
        "local time falls in a gap; moving forward"
      );
      let shifted = local_naive
        .checked_add_signed(
          Duration::hours(1)
        )?;
      tz.from_local_datetime(&shifted)
        .earliest()
    }
  }
}

/// Moves the local calendar date of
/// `reference` by `delta` days, keeping
/// the wall-clock time.
pub fn add_calendar_days<Z: TimeZone>(
  reference: &DateTime<Z>,
  delta: i64
) -> Option<DateTime<Z>> {
  let local = reference.naive_local();
  let date = shift_day(
    local.date(),
    delta
  )?;
  resolve_local(
    &reference.timezone(),
    date.and_time(local.time())
  )
}

fn shift_day(
  date: NaiveDate,
  delta: i64
) -> Option<NaiveDate> {
  let magnitude =
    Days::new(delta.unsigned_abs());
  if delta >= 0 {
    date.checked_add_days(magnitude)
  } else {
    date.checked_sub_days(magnitude)
  }
}

fn offset_delta(
  days: u32,
  include_first_day: bool
) -> i64 {
  i64::from(days)
    - i64::from(include_first_day)
}

/// Target instant for a day offset. On
/// arithmetic failure the reference is
/// returned unchanged.
#[must_use]
pub fn compute_target_date<
  Z: TimeZone
>(
  reference: &DateTime<Z>,
  days: u32,
  include_first_day: bool
) -> DateTime<Z> {
  let delta = offset_delta(
    days,
    include_first_day
  );
  add_calendar_days(reference, delta)
    .unwrap_or_else(|| {
      tracing::warn!(
        days,
        include_first_day,
        "calendar arithmetic failed; keeping reference date"
      );
      reference.clone()
    })
}

#[must_use]
pub fn compute_target_day(
  reference: NaiveDate,
  days: u32,
  include_first_day: bool
) -> NaiveDate {
  let delta = offset_delta(
    days,
    include_first_day
  );
  shift_day(reference, delta)
    .unwrap_or_else(|| {
      tracing::warn!(
        days,
        include_first_day,
        "calendar arithmetic failed; keeping reference date"
      );
      reference
    })
}

#[must_use]
pub fn format_date(
  date: NaiveDate,
  locale_code: &str
) -> String {
  match locale_code {
    | "ja" => {
      format!(
        "{}年{}月{}日 ({})",
        date.year(),
        date.month(),
        date.day(),
        japanese_weekday(
          date.weekday()
        )
      )
    }
    | _ => {
      date
        .format("%a, %B %-d, %Y")
        .to_string()
    }
  }
}

/// Short form for space-constrained
/// widget surfaces.
#[must_use]
pub fn format_widget_date(
  date: NaiveDate,
  locale_code: &str
) -> String {
  match locale_code {
    | "ja" => {
      format!(
        "{}月{}日",
        date.month(),
        date.day()
      )
    }
    | _ => {
      date.format("%b %-d").to_string()
    }
  }
}

/// English gets an ordinal suffix; only
/// 1, 2 and 3 are special-cased, so 21
/// renders as "21th".
#[must_use]
pub fn format_ordinal_or_plain(
  n: u32,
  locale_code: &str
) -> String {
  if locale_code != "en" {
    return n.to_string();
  }
  match n {
    | 1 => "1st".to_string(),
    | 2 => "2nd".to_string(),
    | 3 => "3rd".to_string(),
    | _ => format!("{n}th")
  }
}

fn japanese_weekday(
  weekday: Weekday
) -> &'static str {
  match weekday {
    | Weekday::Mon => "月",
    | Weekday::Tue => "火",
    | Weekday::Wed => "水",
    | Weekday::Thu => "木",
    | Weekday::Fri => "金",
    | Weekday::Sat => "土",
    | Weekday::Sun => "日"
  }
}

/// Start of the next local calendar day.
#[must_use]
pub fn next_local_midnight<
  Z: TimeZone
>(
  now: &DateTime<Z>
) -> DateTime<Z> {
  let tomorrow = now
    .naive_local()
    .date()
    .succ_opt();
  tomorrow
    .and_then(|date| {
      resolve_local(
        &now.timezone(),
        date.and_time(
          chrono::NaiveTime::MIN
        )
      )
    })
    .unwrap_or_else(|| {
      tracing::warn!(
        "could not resolve next midnight; using now + 24h"
      );
      now.clone() + Duration::hours(24)
    })
}

#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_reference_date<
  Z: TimeZone
>(
  input: &str,
  now: &DateTime<Z>
) -> anyhow::Result<DateTime<Z>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now.clone()),
    | "today" => {
      return local_midnight(
        now,
        now.naive_local().date(),
        "today"
      );
    }
    | "tomorrow" => {
      let date = shift_day(
        now.naive_local().date(),
        1
      )
      .ok_or_else(|| {
        anyhow!(
          "tomorrow is out of range"
        )
      })?;
      return local_midnight(
        now, date, "tomorrow"
      );
    }
    | "yesterday" => {
      let date = shift_day(
        now.naive_local().date(),
        -1
      )
      .ok_or_else(|| {
        anyhow!(
          "yesterday is out of range"
        )
      })?;
      return local_midnight(
        now,
        date,
        "yesterday"
      );
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    let date = next_weekday_date(
      now.naive_local().date(),
      target
    );
    return local_midnight(
      now,
      date,
      "weekday-name"
    );
  }

  if let Some(date) =
    parse_literal_date(token)?
  {
    return local_midnight(
      now,
      date,
      "literal-date"
    );
  }

  Err(anyhow!(
    "unrecognized date '{token}'; \
     expected now, today, tomorrow, \
     yesterday, a weekday name, \
     YYYY-MM-DD or YYYYMMDD"
  ))
}

fn local_midnight<Z: TimeZone>(
  now: &DateTime<Z>,
  date: NaiveDate,
  context: &str
) -> anyhow::Result<DateTime<Z>> {
  let midnight = date
    .and_time(chrono::NaiveTime::MIN);
  match now
    .timezone()
    .from_local_datetime(&midnight)
  {
    | LocalResult::Single(dt) => Ok(dt),
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        "ambiguous local midnight; using earliest"
      );
      Ok(if first <= second {
        first
      } else {
        second
      })
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local midnight does not \
         exist in calendar \
         timezone: {context}"
      ))
    }
  }
}

fn dashed_date_regex()
-> anyhow::Result<&'static Regex> {
  static DASHED: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  DASHED
    .get_or_init(|| {
      Regex::new(
        r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})$"
      )
    })
    .as_ref()
    .map_err(|err| {
      anyhow!(
        "invalid date pattern: {err}"
      )
    })
}

fn parse_literal_date(
  token: &str
) -> anyhow::Result<Option<NaiveDate>>
{
  let dashed = dashed_date_regex()?;
  if let Some(captures) =
    dashed.captures(token)
  {
    let year: i32 = captures["year"]
      .parse()
      .context("invalid year")?;
    let month: u32 = captures["month"]
      .parse()
      .context("invalid month")?;
    let day: u32 = captures["day"]
      .parse()
      .context("invalid day")?;
    return NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Some)
    .ok_or_else(|| {
      anyhow!(
        "no such date: {token}"
      )
    });
  }

  if token.len() == 8
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    return NaiveDate::parse_from_str(
      token, "%Y%m%d"
    )
    .map(Some)
    .with_context(|| {
      format!("no such date: {token}")
    });
  }

  Ok(None)
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = i64::from(
    from
      .weekday()
      .num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  shift_day(from, delta)
    .unwrap_or(from)
}
