use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  SecondsFormat,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "taskflow-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TASKFLOW_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TASKFLOW_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// Calendar date of `dt` in the project
/// timezone. Every due-date rule compares
/// against this.
#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

/// `2025-01-01T00:00:00.000Z`, the shape
/// browsers produce for ISO timestamps.
#[must_use]
pub fn format_iso_timestamp(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
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
        "configured project timezone"
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

/// Parses a due-date expression relative
/// to `today`.
///
/// Accepts `today`, `tomorrow`,
/// `yesterday`, weekday names (next
/// occurrence, never today), `+Nd` /
/// `+Nw` offsets and `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return add_days(today, 1);
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  if let Some(days) =
    parse_offset_days(&lower)
  {
    return add_days(today, days);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {token} (expected today, \
     tomorrow, yesterday, a weekday \
     name, +Nd, +Nw or YYYY-MM-DD)"
  ))
}

pub fn add_days(
  date: NaiveDate,
  days: u64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_days(Days::new(days))
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {date} + \
         {days} days"
      )
    })
}

fn parse_offset_days(
  token: &str
) -> Option<u64> {
  static OFFSET_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  let re = OFFSET_RE
    .get_or_init(|| {
      Regex::new(
        r"^\+?(?P<n>\d{1,4})(?P<unit>[dw])$"
      )
      .ok()
    })
    .as_ref()?;

  let captures = re.captures(token)?;
  let n = captures
    .name("n")?
    .as_str()
    .parse::<u64>()
    .ok()?;
  match captures.name("unit")?.as_str()
  {
    | "d" => Some(n),
    | "w" => Some(n * 7),
    | _ => None
  }
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
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as u64;
  let target_idx = target
    .num_days_from_monday()
    as u64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_days(Days::new(delta))
    .unwrap_or(from)
}

/// RFC 3339 timestamps, written with
/// millisecond precision and a `Z`
/// suffix; any RFC 3339 offset is
/// accepted on read.
pub mod iso_timestamp_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso_timestamp(*dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw) => {
          DateTime::parse_from_rfc3339(
            &raw
          )
          .map(|dt| {
            Some(dt.with_timezone(&Utc))
          })
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    format_iso_timestamp,
    parse_due_expr
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_keywords() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_due_expr("Tomorrow", today)
        .expect("tomorrow"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_expr("yesterday", today)
        .expect("yesterday"),
      day(2026, 2, 16)
    );
  }

  #[test]
  fn parses_weekday_name() {
    // 2026-02-17 is a Tuesday.
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr("wednesday", today)
        .expect("weekday"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_expr("tue", today)
        .expect("same weekday"),
      day(2026, 2, 24)
    );
  }

  #[test]
  fn parses_offsets_and_iso_dates() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_expr("+3d", today)
        .expect("days"),
      day(2026, 2, 20)
    );
    assert_eq!(
      parse_due_expr("2w", today)
        .expect("weeks"),
      day(2026, 3, 3)
    );
    assert_eq!(
      parse_due_expr(
        "2025-07-20",
        today
      )
      .expect("iso"),
      day(2025, 7, 20)
    );
    assert!(
      parse_due_expr("soonish", today)
        .is_err()
    );
  }

  #[test]
  fn iso_timestamp_has_millis_and_z() {
    let dt = Utc
      .with_ymd_and_hms(
        2025, 1, 1, 0, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      format_iso_timestamp(dt),
      "2025-01-01T00:00:00.000Z"
    );
  }
}
