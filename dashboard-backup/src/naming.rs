//! Storage key layout.
//!
//! Every stored artifact lives under a `/`-joined logical key:
//!
//! | Kind     | Key                                                |
//! |----------|----------------------------------------------------|
//! | hourly   | `hourly/<host>/<title>_<uid>.json`                 |
//! | daily    | `daily/<DD-MM-YYYY>/<host>/<title>_<uid>.json`     |
//! | revision | `revision/<host>/<title>_<uid>/version<N>.json`    |
//!
//! Folder-level meta records sit next to the content at `<folder>.meta_data`.
//! Restore and create look dashboards up with the same normalization, so the
//! functions here must stay pure.

use chrono::NaiveDate;

pub const HOURLY_ROOT: &str = "hourly";
pub const DAILY_ROOT: &str = "daily";
pub const REVISION_ROOT: &str = "revision";

/// Reserved file name of folder-level meta records.
pub const META_SENTINEL: &str = ".meta_data";

/// Extension of every dashboard document.
pub const JSON_SUFFIX: &str = ".json";

/// Date layout of daily folders.
pub const DAILY_DATE_FORMAT: &str = "%d-%m-%Y";

/// Strip spaces and lower-case a dashboard title.
pub fn normalize_title(title: &str) -> String {
    title.replace(' ', "").to_lowercase()
}

/// `<title>_<uid>` with both parts normalized.
pub fn dashboard_stem(title: &str, uid: &str) -> String {
    format!("{}_{}", normalize_title(title), uid.to_lowercase())
}

pub fn dashboard_file_name(title: &str, uid: &str) -> String {
    format!("{}{}", dashboard_stem(title, uid), JSON_SUFFIX)
}

pub fn version_file_name(version: u64) -> String {
    format!("version{}{}", version, JSON_SUFFIX)
}

pub fn hourly_folder(host: &str) -> String {
    format!("{}/{}/", HOURLY_ROOT, host)
}

pub fn daily_folder(host: &str, date: NaiveDate) -> String {
    format!("{}/{}/{}/", DAILY_ROOT, format_daily_date(date), host)
}

pub fn revision_folder(host: &str, title: &str, uid: &str) -> String {
    format!("{}/{}/{}/", REVISION_ROOT, host, dashboard_stem(title, uid))
}

/// Prefix shared by every daily folder.
pub fn daily_root() -> String {
    format!("{}/", DAILY_ROOT)
}

pub fn meta_key(folder: &str) -> String {
    format!("{}{}", folder, META_SENTINEL)
}

pub fn format_daily_date(date: NaiveDate) -> String {
    date.format(DAILY_DATE_FORMAT).to_string()
}

/// Parse a daily folder date. Unpadded input such as `28-4-2020` is accepted.
pub fn parse_daily_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DAILY_DATE_FORMAT).ok()
}

/// File name of a key without its `.json` extension.
pub fn key_stem(key: &str) -> &str {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    file_name.strip_suffix(JSON_SUFFIX).unwrap_or(file_name)
}

/// Host segment of a daily key (`daily/<date>/<host>/...`).
pub fn daily_key_host(key: &str) -> Option<&str> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(DAILY_ROOT), Some(_date), Some(host)) => Some(host),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dashboard_file_name() {
        assert_eq!(dashboard_file_name("CPU Load", "abc"), "cpuload_abc.json");
        assert_eq!(dashboard_file_name("Mem", "DEF"), "mem_def.json");
        assert_eq!(dashboard_file_name(" Net  IO ", "X1"), "netio_x1.json");
    }

    #[test]
    fn test_hourly_folder() {
        assert_eq!(hourly_folder("prod"), "hourly/prod/");
        assert_eq!(meta_key(&hourly_folder("prod")), "hourly/prod/.meta_data");
    }

    #[test]
    fn test_daily_folder_is_stable_and_date_specific() {
        let a = daily_folder("prod", date(5, 3, 2024));
        assert_eq!(a, "daily/05-03-2024/prod/");
        assert_eq!(a, daily_folder("prod", date(5, 3, 2024)));
        assert_ne!(a, daily_folder("prod", date(6, 3, 2024)));
    }

    #[test]
    fn test_revision_folder() {
        assert_eq!(
            revision_folder("prod", "CPU Load", "ABC"),
            "revision/prod/cpuload_abc/"
        );
        assert_eq!(
            format!("{}{}", revision_folder("prod", "Mem", "def"), version_file_name(3)),
            "revision/prod/mem_def/version3.json"
        );
    }

    #[test]
    fn test_parse_daily_date_accepts_unpadded() {
        assert_eq!(parse_daily_date("28-4-2020"), Some(date(28, 4, 2020)));
        assert_eq!(parse_daily_date("28-04-2020"), Some(date(28, 4, 2020)));
        assert_eq!(parse_daily_date("hourly"), None);
        assert_eq!(format_daily_date(date(28, 4, 2020)), "28-04-2020");
    }

    #[test]
    fn test_key_stem() {
        assert_eq!(key_stem("hourly/prod/cpuload_abc.json"), "cpuload_abc");
        assert_eq!(key_stem("mem_def.json"), "mem_def");
        assert_eq!(key_stem("hourly/prod/.meta_data"), ".meta_data");
    }

    #[test]
    fn test_daily_key_host() {
        assert_eq!(daily_key_host("daily/05-03-2024/prod/mem_def.json"), Some("prod"));
        assert_eq!(daily_key_host("hourly/prod/mem_def.json"), None);
    }
}
