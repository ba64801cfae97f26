//! Transfer planning
//!
//! Narrows the enumerated candidates down to the files that will be
//! transferred: enabled subfolder first, then the inclusive date range on
//! the local calendar date of the modification time.

use crate::core::model::TransferConfig;
use crate::source::CandidateFile;

/// A candidate in an enabled subfolder whose timestamp could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFailure {
    /// Source location, as shown in log lines
    pub location: String,
    pub relative_path: String,
    pub message: String,
}

/// Files to transfer, in enumeration order
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    entries: Vec<CandidateFile>,
    /// Candidates considered
    pub enumerated: usize,
    /// Dropped because their subfolder is not enabled
    pub excluded_disabled: usize,
    /// Dropped because they fall outside the date range
    pub excluded_out_of_range: usize,
    /// Dropped because their timestamp is unknown; each counts as an error
    pub timestamp_failures: Vec<TimestampFailure>,
}

impl TransferPlan {
    pub fn entries(&self) -> &[CandidateFile] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateFile> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a TransferPlan {
    type Item = &'a CandidateFile;
    type IntoIter = std::slice::Iter<'a, CandidateFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Build the plan for `config` from everything the source enumerated
pub fn build_plan(config: &TransferConfig, candidates: Vec<CandidateFile>) -> TransferPlan {
    let mut plan = TransferPlan {
        enumerated: candidates.len(),
        ..TransferPlan::default()
    };

    for candidate in candidates {
        if !config.is_enabled(&candidate.subfolder) {
            plan.excluded_disabled += 1;
            continue;
        }

        let date = match &candidate.modified {
            Ok(time) => time.date_naive(),
            Err(message) => {
                plan.timestamp_failures.push(TimestampFailure {
                    location: candidate.location.to_string(),
                    relative_path: candidate.relative_path.clone(),
                    message: message.clone(),
                });
                continue;
            }
        };

        if config.in_range(date) {
            plan.entries.push(candidate);
        } else {
            plan.excluded_out_of_range += 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{parse_date, SourceSpec};
    use crate::source::FileLocation;
    use crate::testdb::local_noon;
    use chrono::{Local, NaiveDate, TimeZone};

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn config(start: &str, end: &str) -> TransferConfig {
        TransferConfig::new(
            SourceSpec::Local {
                root: "/backup".into(),
            },
            "/out",
            date(start),
            date(end),
        )
    }

    fn candidate(subfolder: &str, name: &str, day: &str) -> CandidateFile {
        CandidateFile {
            location: FileLocation::Local(format!("/backup/{}/{}", subfolder, name).into()),
            subfolder: subfolder.into(),
            relative_path: format!("{}/{}", subfolder, name),
            modified: Ok(local_noon(date(day))),
        }
    }

    fn names(plan: &TransferPlan) -> Vec<&str> {
        plan.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_inclusive_boundaries() {
        let cfg = config("2025-09-17", "2025-12-17");
        let plan = build_plan(
            &cfg,
            vec![
                candidate("WhatsApp Images", "before.jpg", "2025-09-16"),
                candidate("WhatsApp Images", "start.jpg", "2025-09-17"),
                candidate("WhatsApp Images", "middle.jpg", "2025-10-30"),
                candidate("WhatsApp Images", "end.jpg", "2025-12-17"),
                candidate("WhatsApp Images", "after.jpg", "2025-12-18"),
            ],
        );

        assert_eq!(
            names(&plan),
            vec![
                "WhatsApp Images/start.jpg",
                "WhatsApp Images/middle.jpg",
                "WhatsApp Images/end.jpg"
            ]
        );
        assert_eq!(plan.excluded_out_of_range, 2);
        assert_eq!(plan.enumerated, 5);
    }

    #[test]
    fn test_time_of_day_ignored() {
        let cfg = config("2025-09-17", "2025-09-17");
        let mut early = candidate("WhatsApp Images", "early.jpg", "2025-09-17");
        early.modified = Ok(Local.with_ymd_and_hms(2025, 9, 17, 0, 0, 1).earliest().unwrap());
        let mut late = candidate("WhatsApp Images", "late.jpg", "2025-09-17");
        late.modified = Ok(Local.with_ymd_and_hms(2025, 9, 17, 23, 59, 59).earliest().unwrap());

        let plan = build_plan(&cfg, vec![early, late]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_disabled_subfolder_excluded_even_in_range() {
        let cfg = config("2025-09-17", "2025-12-17").with_subfolders(["WhatsApp Images"]);
        let plan = build_plan(
            &cfg,
            vec![
                candidate("WhatsApp Images", "img1.jpg", "2025-10-01"),
                candidate("WhatsApp Video", "vid1.mp4", "2025-10-01"),
            ],
        );

        assert_eq!(names(&plan), vec!["WhatsApp Images/img1.jpg"]);
        assert_eq!(plan.excluded_disabled, 1);
        assert_eq!(plan.enumerated, 2);
    }

    #[test]
    fn test_order_preserved() {
        let cfg = config("2025-01-01", "2025-12-31");
        let plan = build_plan(
            &cfg,
            vec![
                candidate("WhatsApp Video", "z.mp4", "2025-03-01"),
                candidate("WhatsApp Images", "a.jpg", "2025-01-01"),
                candidate("WhatsApp Video", "m.mp4", "2025-02-01"),
            ],
        );
        assert_eq!(
            names(&plan),
            vec![
                "WhatsApp Video/z.mp4",
                "WhatsApp Images/a.jpg",
                "WhatsApp Video/m.mp4"
            ]
        );
    }

    #[test]
    fn test_unknown_timestamp_recorded_only_when_enabled() {
        let cfg = config("2025-01-01", "2025-12-31").with_subfolders(["WhatsApp Images"]);
        let mut broken = candidate("WhatsApp Images", "broken.jpg", "2025-05-01");
        broken.modified = Err("stat failed".into());
        let mut ignored = candidate("WhatsApp Audio", "note.opus", "2025-05-01");
        ignored.modified = Err("stat failed".into());

        let plan = build_plan(&cfg, vec![broken, ignored]);
        assert!(plan.is_empty());
        assert_eq!(plan.timestamp_failures.len(), 1);
        assert_eq!(
            plan.timestamp_failures[0].relative_path,
            "WhatsApp Images/broken.jpg"
        );
        assert_eq!(plan.excluded_disabled, 1);
    }

    #[test]
    fn test_subfolder_match_is_case_sensitive() {
        let cfg = config("2025-01-01", "2025-12-31").with_subfolders(["whatsapp images"]);
        let plan = build_plan(&cfg, vec![candidate("WhatsApp Images", "a.jpg", "2025-05-01")]);
        assert!(plan.is_empty());
        assert!(plan.timestamp_failures.is_empty());
    }
}
