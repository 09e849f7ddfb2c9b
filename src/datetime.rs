use chrono::{
    DateTime, Datelike, Duration, DurationRound, FixedOffset, Local, NaiveDate, NaiveDateTime,
    NaiveTime, Offset, TimeZone, Utc,
};

use crate::error::TrackError;

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// 秒以下を切り捨てる。
pub fn truncate_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(Duration::minutes(1)).unwrap_or(time)
}

/// 秒数を分単位に丸めて`2h0m`の形式にする。
pub fn format_duration(seconds: i64) -> String {
    let minutes = (seconds as f64 / 60.0).round() as i64;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours == 0 {
        format!("{}m", minutes)
    } else {
        format!("{}h{}m", hours, minutes)
    }
}

/// 期間の上限。100年分の秒数。
const MAX_DURATION_SECONDS: f64 = 100.0 * 365.0 * 24.0 * 3600.0;

/// `30m`や`1h30m`のような期間の文字列をパースする。
///
/// 単位は`w`, `d`, `h`, `m`, `s`を受け付け、数値は小数でもよい。
/// 100年を超える期間は受け付けない。
pub fn parse_duration(arg: &str) -> Result<Duration, TrackError> {
    let arg = arg.trim();
    let invalid = || TrackError::Validation(format!("Invalid duration: {}", arg));
    if arg == "0" {
        return Ok(Duration::zero());
    }
    if arg.is_empty() {
        return Err(invalid());
    }

    let mut seconds = 0.0;
    let mut rest = arg;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "w" => 7.0 * 24.0 * 3600.0,
            "d" => 24.0 * 3600.0,
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            _ => return Err(invalid()),
        };
        seconds += value * unit;
        if !seconds.is_finite() || seconds > MAX_DURATION_SECONDS {
            return Err(TrackError::Validation(format!(
                "Duration is too long: {}",
                arg
            )));
        }
        rest = &rest[unit_len..];
    }

    Ok(Duration::milliseconds((seconds * 1000.0).round() as i64))
}

/// 日付と時刻を含むフォーマット。
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// 時刻のみのフォーマット。日付は今日とする。
const TIME_FORMATS: [&str; 3] = ["%I:%M%p", "%I:%M %p", "%H:%M"];

/// 時刻を解釈するタイムゾーン。
#[derive(Clone, Copy, Debug)]
enum Zone {
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    fn today(self) -> NaiveDate {
        match self {
            Zone::Local => now().with_timezone(&Local).date_naive(),
            Zone::Fixed(offset) => now().with_timezone(&offset).date_naive(),
        }
    }

    fn resolve(self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Local => Local.from_local_datetime(naive).single().map(|t| t.to_utc()),
            Zone::Fixed(offset) => offset.from_local_datetime(naive).single().map(|t| t.to_utc()),
        }
    }
}

/// 時刻の引数をパースする。
///
/// RFC 3339のほか`2006-01-02 3:04:05 PM UTC`, `01-02 3:04 PM`, `3:04PM`, `2006-01-02`
/// などの形式を受け付ける。タイムゾーンを省略した場合はLocalタイムゾーンとして扱い、
/// 年を省略した場合は今年、日付を省略した場合は今日とする。
pub fn parse_time_arg(arg: &str) -> Result<DateTime<Utc>, TrackError> {
    let arg = arg.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(arg) {
        return Ok(time.to_utc());
    }

    let (body, zone) = split_zone(arg)?;
    let naive = parse_naive(body, zone).ok_or_else(|| {
        TrackError::Validation(format!(
            "Unable to parse {} using formats {:?}, {:?} or %Y-%m-%d",
            arg, DATETIME_FORMATS, TIME_FORMATS
        ))
    })?;

    zone.resolve(&naive).ok_or_else(|| {
        TrackError::Validation(format!("{} is ambiguous or does not exist", arg))
    })
}

fn parse_naive(body: &str, zone: Zone) -> Option<NaiveDateTime> {
    let with_year = format!("{}-{}", zone.today().year(), body);
    for candidate in [body, with_year.as_str()] {
        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, format) {
                return Some(naive);
            }
        }
    }
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(body, format) {
            return Some(zone.today().and_time(time));
        }
    }
    NaiveDate::parse_from_str(body, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// 末尾のタイムゾーン指定を切り出す。
fn split_zone(arg: &str) -> Result<(&str, Zone), TrackError> {
    let Some((body, last)) = arg.rsplit_once(' ') else {
        return Ok((arg, Zone::Local));
    };
    let upper = last.to_ascii_uppercase();
    if upper == "AM" || upper == "PM" || (last.contains(':') && !last.starts_with(['+', '-'])) {
        return Ok((arg, Zone::Local));
    }
    if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
        return Ok((body, Zone::Fixed(Utc.fix())));
    }
    if last.starts_with(['+', '-']) {
        return parse_offset(last).map(|offset| (body, Zone::Fixed(offset)));
    }
    if last.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(TrackError::Validation(format!(
            "Unsupported time zone {} (use UTC or a numeric offset such as +0900)",
            last
        )));
    }
    Ok((arg, Zone::Local))
}

/// `+0900`, `-05:00`, `+09`の形式のオフセットをパースする。
fn parse_offset(value: &str) -> Result<FixedOffset, TrackError> {
    let invalid = || TrackError::Validation(format!("Invalid time zone offset: {}", value));
    let sign = if value.starts_with('-') { -1 } else { 1 };
    let digits: String = value[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
