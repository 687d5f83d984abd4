//! Tiered rotating backups: recent / daily / weekly.
//!
//! Rotation always promotes from the oldest tier inward *before* shifting,
//! so a single rotation call can cascade a `.bak.3` all the way into
//! `.bak.weekly.1` if enough real time has passed since the last one.

use crate::persistence::with_extension_suffix;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const BACKUP_INTERVAL_SECONDS: f64 = 3600.0;
const MAX_RECENT: u32 = 3;
const MAX_DAILY: u32 = 7;
const MAX_WEEKLY: u32 = 4;
const DAY_SECS: f64 = 86_400.0;
const WEEK_SECS: f64 = DAY_SECS * 7.0;

fn recent_path(path: &Path, i: u32) -> PathBuf {
    with_extension_suffix(path, &format!("bak.{i}"))
}

fn daily_path(path: &Path, i: u32) -> PathBuf {
    with_extension_suffix(path, &format!("bak.daily.{i}"))
}

fn weekly_path(path: &Path, i: u32) -> PathBuf {
    with_extension_suffix(path, &format!("bak.weekly.{i}"))
}

fn age_secs(path: &Path, now: SystemTime) -> Option<f64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    now.duration_since(modified).ok().map(|d| d.as_secs_f64())
}

/// Runs one rotation pass. `path` must already exist; callers are expected
/// to have just completed a successful save.
pub fn rotate(path: &Path, now: SystemTime) {
    let oldest_recent = recent_path(path, MAX_RECENT);
    if oldest_recent.exists() {
        let daily_1 = daily_path(path, 1);
        let should_promote = match age_secs(&daily_1, now) {
            Some(age) => age >= DAY_SECS,
            None => true, // no daily backup yet
        };
        if should_promote {
            promote_to_daily(path, &oldest_recent, now);
        }
    }

    for i in (1..MAX_RECENT).rev() {
        let from = recent_path(path, i);
        let to = recent_path(path, i + 1);
        if from.exists() {
            if let Err(e) = fs::copy(&from, &to) {
                log::error!("failed to rotate {} -> {}: {e}", from.display(), to.display());
            }
        }
    }

    let bak1 = recent_path(path, 1);
    if let Err(e) = fs::copy(path, &bak1) {
        log::error!("failed to create recent backup {}: {e}", bak1.display());
    } else {
        log::debug!("created recent backup {}", bak1.display());
    }
}

fn promote_to_daily(path: &Path, source: &Path, now: SystemTime) {
    let oldest_daily = daily_path(path, MAX_DAILY);
    if oldest_daily.exists() {
        let weekly_1 = weekly_path(path, 1);
        let should_promote = match age_secs(&weekly_1, now) {
            Some(age) => age >= WEEK_SECS,
            None => true,
        };
        if should_promote {
            promote_to_weekly(path, &oldest_daily, now);
        }
    }

    for i in (1..MAX_DAILY).rev() {
        let from = daily_path(path, i);
        let to = daily_path(path, i + 1);
        if from.exists() {
            if let Err(e) = fs::copy(&from, &to) {
                log::error!("failed to rotate {} -> {}: {e}", from.display(), to.display());
            }
        }
    }

    let daily_1 = daily_path(path, 1);
    if let Err(e) = fs::copy(source, &daily_1) {
        log::error!("failed to promote {} to daily: {e}", source.display());
    } else {
        log::debug!("promoted {} to daily backup {}", source.display(), daily_1.display());
    }
}

fn promote_to_weekly(path: &Path, source: &Path, _now: SystemTime) {
    for i in (1..MAX_WEEKLY).rev() {
        let from = weekly_path(path, i);
        let to = weekly_path(path, i + 1);
        if from.exists() {
            if let Err(e) = fs::copy(&from, &to) {
                log::error!("failed to rotate {} -> {}: {e}", from.display(), to.display());
            }
        }
    }

    let weekly_1 = weekly_path(path, 1);
    if let Err(e) = fs::copy(source, &weekly_1) {
        log::error!("failed to promote {} to weekly: {e}", source.display());
    } else {
        log::debug!("promoted {} to weekly backup {}", source.display(), weekly_1.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn first_rotation_creates_only_bak_1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        fs::write(&path, b"{}").unwrap();

        rotate(&path, SystemTime::now());

        assert!(recent_path(&path, 1).exists());
        assert!(!recent_path(&path, 2).exists());
        assert!(!daily_path(&path, 1).exists());
    }

    #[test]
    fn recent_tier_never_exceeds_three_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        fs::write(&path, b"{}").unwrap();

        for _ in 0..5 {
            rotate(&path, SystemTime::now());
        }

        assert!(recent_path(&path, 1).exists());
        assert!(recent_path(&path, 2).exists());
        assert!(recent_path(&path, 3).exists());
    }

    #[test]
    fn promotes_oldest_recent_into_daily_once_a_day_has_passed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        fs::write(&path, b"{}").unwrap();

        // seed .bak.3 directly so the first rotate() call sees it as present.
        fs::write(recent_path(&path, 3), b"old").unwrap();

        let now = SystemTime::now() + Duration::from_secs(2 * 24 * 3600);
        rotate(&path, now);

        assert!(daily_path(&path, 1).exists());
    }
}
