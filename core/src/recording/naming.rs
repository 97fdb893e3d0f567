use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::prelude::{CoreError, CoreResult};
use crate::telemetry::log::LogManager;

const LOCAL_STAMP: &str = "%Y%m%d-%H%M%S";

/// Rewrites UTC-stamped segment names into local time.
///
/// Names look like `<prefix>YYYYMMDD-HHMMSS_<suffix>.<ext>`: the first `-`
/// splits date and time, and the last `_` has to follow it.
#[derive(Debug, Clone)]
pub struct FileRenamer {
    tz: Tz,
    logger: LogManager,
}

impl FileRenamer {
    pub fn new(tz: Tz, logger: LogManager) -> Self {
        Self { tz, logger }
    }

    /// Uses the `TZ` environment variable, then the host zone
    /// (`/etc/localtime` and friends), then UTC.
    pub fn from_env(logger: LogManager) -> Self {
        let system = iana_time_zone::get_timezone()
            .map_err(|err| logger.warn(&format!("host time zone unavailable: {}", err)))
            .ok();
        let tz = resolve_zone(env::var("TZ").ok(), system, &logger);
        Self::new(tz, logger)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Local-time version of `filename`, without touching the disk.
    pub fn local_name(&self, filename: &str) -> CoreResult<String> {
        let malformed = |why: &str| CoreError::MalformedFilename(format!("{}: {}", filename, why));

        let dash = filename.find('-').ok_or_else(|| malformed("no time separator"))?;
        match filename.rfind('_') {
            Some(underscore) if underscore > dash => {}
            _ => return Err(malformed("no suffix after the time")),
        }
        let date_start = dash
            .checked_sub(8)
            .ok_or_else(|| malformed("date too short"))?;
        let date = filename
            .get(date_start..dash)
            .ok_or_else(|| malformed("date too short"))?;
        let time = filename
            .get(dash + 1..dash + 7)
            .ok_or_else(|| malformed("time too short"))?;
        let ext = filename
            .rfind('.')
            .and_then(|dot| filename.get(dot..))
            .ok_or_else(|| malformed("no extension"))?;

        let utc = parse_stamp(date, time).ok_or_else(|| malformed("invalid date or time"))?;
        let prefix = &filename[..date_start];
        Ok(format!(
            "{}{}{}",
            prefix,
            local_stamp(&utc, &self.tz),
            ext
        ))
    }

    /// Renames `dirpath/filename` in place; the original stays on failure.
    pub fn rename(&self, filename: &str, dirpath: &Path) -> CoreResult<PathBuf> {
        let renamed = match self.local_name(filename) {
            Ok(name) => dirpath.join(name),
            Err(err) => {
                self.logger.error(&err.to_string());
                return Err(err);
            }
        };
        let original = dirpath.join(filename);
        if let Err(err) = fs::rename(&original, &renamed) {
            self.logger.error(&format!(
                "could not rename {}: {}",
                original.display(),
                err
            ));
            return Err(err.into());
        }
        self.logger
            .record(&format!("segment renamed to {}", renamed.display()));
        Ok(renamed)
    }

    /// Path of the next looping-stream chunk.
    pub fn chunk_location(&self, dir: &Path, fragment_id: u32, now: DateTime<Utc>) -> PathBuf {
        dir.join(format!(
            "stream_{:05}_{}.mp4",
            fragment_id,
            local_stamp(&now, &self.tz)
        ))
    }
}

/// Picks the first of `tz_env` and `system` that names a known zone.
fn resolve_zone(tz_env: Option<String>, system: Option<String>, logger: &LogManager) -> Tz {
    for name in tz_env.into_iter().chain(system) {
        let name = name.trim_start_matches(':');
        if name.is_empty() {
            continue;
        }
        match name.parse::<Tz>() {
            Ok(tz) => return tz,
            Err(_) => logger.warn(&format!("unknown time zone '{}'", name)),
        }
    }
    logger.warn("no usable time zone, naming segments in UTC");
    chrono_tz::UTC
}

fn parse_stamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    if !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day = NaiveDate::from_ymd_opt(
        date[0..4].parse().ok()?,
        date[4..6].parse().ok()?,
        date[6..8].parse().ok()?,
    )?;
    let clock = NaiveTime::from_hms_opt(
        time[0..2].parse().ok()?,
        time[2..4].parse().ok()?,
        time[4..6].parse().ok()?,
    )?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(day, clock)))
}

/// `YYYYmmdd-HHMMSS_<TZ abbreviation>` in `tz`.
fn local_stamp(utc: &DateTime<Utc>, tz: &Tz) -> String {
    let local = utc.with_timezone(tz);
    format!("{}_{}", local.format(LOCAL_STAMP), local.format("%Z"))
}
