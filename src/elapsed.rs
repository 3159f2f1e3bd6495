use chrono::Utc;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Coarse "how long ago" for a Unix timestamp in seconds. Unknown or future
/// times print as `--`.
pub fn format_elapsed(since: Option<u64>, now: u64) -> String {
    let Some(since) = since else {
        return "--".to_string();
    };
    let Some(passed) = now.checked_sub(since) else {
        return "--".to_string();
    };
    if passed < MINUTE {
        format!("{passed}s ago")
    } else if passed < HOUR {
        format!("{}m ago", passed / MINUTE)
    } else if passed < DAY {
        format!("{}h ago", passed / HOUR)
    } else {
        format!("{}d ago", passed / DAY)
    }
}

pub fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

pub fn format_elapsed_now(since: Option<u64>) -> String {
    format_elapsed(since, now_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_000_000;

    #[test]
    fn unknown_time() {
        assert_eq!(format_elapsed(None, NOW), "--");
    }

    #[test]
    fn future_time() {
        assert_eq!(format_elapsed(Some(NOW + 1), NOW), "--");
    }

    #[test]
    fn seconds() {
        assert_eq!(format_elapsed(Some(NOW), NOW), "0s ago");
        assert_eq!(format_elapsed(Some(NOW - 59), NOW), "59s ago");
    }

    #[test]
    fn minutes() {
        assert_eq!(format_elapsed(Some(NOW - 60), NOW), "1m ago");
        assert_eq!(format_elapsed(Some(NOW - 3599), NOW), "59m ago");
    }

    #[test]
    fn hours() {
        assert_eq!(format_elapsed(Some(NOW - 3600), NOW), "1h ago");
        assert_eq!(format_elapsed(Some(NOW - 86_399), NOW), "23h ago");
    }

    #[test]
    fn days() {
        assert_eq!(format_elapsed(Some(NOW - 86_400), NOW), "1d ago");
        assert_eq!(format_elapsed(Some(NOW - 10 * 86_400 - 5), NOW), "10d ago");
    }
}
