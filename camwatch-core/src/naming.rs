use chrono::{Datelike, NaiveDateTime, Timelike};

pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Deterministic artifact name for a capture started at `now`:
/// `DDMMYYYY_HHMMSS.mp4`, zero-padded.
///
/// Two names can only collide if two sessions start within the same wall-clock
/// second for the same camera, which the one-live-session-per-camera rule in
/// the session table already rules out.
pub fn artifact_filename(now: NaiveDateTime) -> String {
    format!(
        "{:02}{:02}{:04}_{:02}{:02}{:02}.{ARTIFACT_EXTENSION}",
        now.day(),
        now.month(),
        now.year(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn pads_every_field() {
        assert_eq!(artifact_filename(at(2025, 3, 7, 9, 5, 4)), "07032025_090504.mp4");
    }

    #[test]
    fn keeps_wide_fields_intact() {
        assert_eq!(
            artifact_filename(at(2026, 12, 31, 23, 59, 59)),
            "31122026_235959.mp4"
        );
    }

    #[test]
    fn same_second_is_same_name() {
        assert_eq!(
            artifact_filename(at(2026, 1, 2, 3, 4, 5)),
            artifact_filename(at(2026, 1, 2, 3, 4, 5))
        );
    }
}
