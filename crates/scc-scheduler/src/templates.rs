//! The fixed set of known job templates this daemon schedules.

use scc_models::{JobPayload, JobTemplate};

pub const DAILY_CAPTION_CHECK: &str = "daily-caption-check";
pub const DAILY_VOD_PROCESS_MORNING: &str = "daily-vod-process-morning";
pub const DAILY_VOD_PROCESS_EVENING: &str = "daily-vod-process-evening";
pub const CLEANUP: &str = "cleanup";

/// The default timetable: caption audit at 03:00, two VOD processing
/// sweeps at 06:00 and 18:00, cleanup nightly at 04:00. All UTC unless
/// overridden by configuration.
pub fn default_templates() -> Vec<JobTemplate> {
    vec![
        JobTemplate::new(DAILY_CAPTION_CHECK, "0 3 * * *", "default", JobPayload::CaptionCheck),
        JobTemplate::new(
            DAILY_VOD_PROCESS_MORNING,
            "0 6 * * *",
            "vod_processing",
            JobPayload::ProcessRecentVods { recent_n: None },
        ),
        JobTemplate::new(
            DAILY_VOD_PROCESS_EVENING,
            "0 18 * * *",
            "vod_processing",
            JobPayload::ProcessRecentVods { recent_n: None },
        ),
        JobTemplate::new(CLEANUP, "0 4 * * *", "default", JobPayload::Cleanup),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_cover_all_known_identifiers() {
        let names: Vec<String> = default_templates().into_iter().map(|t| t.name.as_str().to_string()).collect();
        assert!(names.contains(&DAILY_CAPTION_CHECK.to_string()));
        assert!(names.contains(&DAILY_VOD_PROCESS_MORNING.to_string()));
        assert!(names.contains(&DAILY_VOD_PROCESS_EVENING.to_string()));
        assert!(names.contains(&CLEANUP.to_string()));
    }
}
