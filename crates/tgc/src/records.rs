//! JSON result files and the short human summary printed after a check.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use tgc_core::domain::{BatchResult, ResolutionOutcome, NOT_FOUND_MESSAGE};

use crate::media::file_safe;

const NAMED_IDS: usize = 3;

/// `check_<first 3 ids>[_and_<n>_more]_<YYYYmmdd_HHMMSS>.json`
pub fn result_file_name(ids: &[String], at: NaiveDateTime) -> String {
    let mut label = ids
        .iter()
        .take(NAMED_IDS)
        .map(|id| file_safe(id))
        .collect::<Vec<_>>()
        .join("_");
    if ids.len() > NAMED_IDS {
        label.push_str(&format!("_and_{}_more", ids.len() - NAMED_IDS));
    }
    format!("check_{label}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

pub fn write_results(
    dir: &Path,
    ids: &[String],
    results: &BatchResult,
    at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(result_file_name(ids, at));
    std::fs::write(&path, serde_json::to_string_pretty(results)?)?;
    Ok(path)
}

pub fn summary_lines(results: &BatchResult) -> Vec<String> {
    results
        .iter()
        .map(|(id, outcome)| match outcome {
            ResolutionOutcome::Found(p) => {
                let mut line = format!(
                    "✓ {id}: {} {} (@{})",
                    p.first_name,
                    p.last_name,
                    p.username.as_deref().unwrap_or("no username")
                );
                if !p.profile_photo_refs.is_empty() {
                    line.push_str(&format!(" - {} profile photos", p.profile_photo_refs.len()));
                }
                line
            }
            ResolutionOutcome::NotFound => format!("❌ {id}: {NOT_FOUND_MESSAGE}"),
            ResolutionOutcome::Failed(kind, msg) => format!("❌ {id}: {msg} ({kind})"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tgc_core::{
        domain::{PhotoRef, ProfileRecord},
        ErrorKind,
    };

    use super::*;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    fn profile() -> ProfileRecord {
        ProfileRecord {
            remote_id: 7,
            username: Some("ann".into()),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            phone_used: "+15551234567".into(),
            premium: false,
            verified: false,
            fake: false,
            bot: false,
            last_seen_summary: "Recently".into(),
            bio: None,
            profile_photo_refs: vec![PhotoRef("photos/ann/photo_0.jpg".into())],
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn file_name_lists_first_three_ids() {
        assert_eq!(
            result_file_name(&ids(&["a", "b"]), at()),
            "check_a_b_20240309_140507.json"
        );
        assert_eq!(
            result_file_name(&ids(&["a", "b", "c", "d", "e"]), at()),
            "check_a_b_c_and_2_more_20240309_140507.json"
        );
    }

    #[test]
    fn written_file_keeps_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = BatchResult::new();
        results.insert("zed".into(), ResolutionOutcome::NotFound);
        results.insert("ann".into(), ResolutionOutcome::Found(profile()));

        let path =
            write_results(&dir.path().join("results"), &ids(&["zed", "ann"]), &results, at())
                .unwrap();

        let txt = std::fs::read_to_string(&path).unwrap();
        assert!(txt.find("\"zed\"").unwrap() < txt.find("\"ann\"").unwrap());

        let json: serde_json::Value = serde_json::from_str(&txt).unwrap();
        assert_eq!(json["zed"]["error"], NOT_FOUND_MESSAGE);
        assert_eq!(json["ann"]["id"], 7);
        assert_eq!(json["ann"]["profile_photos"][0], "photos/ann/photo_0.jpg");
    }

    #[test]
    fn summary_marks_found_and_missing() {
        let mut results = BatchResult::new();
        results.insert("ann".into(), ResolutionOutcome::Found(profile()));
        results.insert(
            "bob".into(),
            ResolutionOutcome::Failed(ErrorKind::RateLimited, "slow down".into()),
        );
        results.insert("cid".into(), ResolutionOutcome::NotFound);

        let lines = summary_lines(&results);
        assert_eq!(lines[0], "✓ ann: Ann Lee (@ann) - 1 profile photos");
        assert!(lines[1].starts_with("❌ bob: slow down"));
        assert_eq!(lines[2], format!("❌ cid: {NOT_FOUND_MESSAGE}"));
    }
}
