//! Plain-text rendering for operator output.

use std::fmt::Write;

use services::{DeleteReport, DeleteStatus, FlagListing, ReviewEvent, ReviewOutcome, ReviewTally};

const HASH_WIDTH: usize = 20;
const TIME_WIDTH: usize = 19;
const PATH_WIDTH: usize = 60;
const RULE_WIDTH: usize = 120;

fn rule(width: usize) -> String {
    "─".repeat(width)
}

/// Keeps the head of long hashes.
pub fn truncate_hash(hash: &str) -> String {
    if hash.chars().count() > HASH_WIDTH {
        let head: String = hash.chars().take(HASH_WIDTH - 2).collect();
        format!("{head}..")
    } else {
        hash.to_string()
    }
}

/// Keeps the tail of long paths, where the file name lives.
pub fn truncate_path(path: &str) -> String {
    let len = path.chars().count();
    if len > PATH_WIDTH {
        let tail: String = path.chars().skip(len - (PATH_WIDTH - 2)).collect();
        format!("..{tail}")
    } else {
        path.to_string()
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

pub fn render_listing(listing: &FlagListing) -> String {
    let mut out = String::new();

    if listing.flags.is_empty() {
        out.push_str("No flagged tiles found.\n");
    } else {
        let summary = &listing.summary;
        let _ = writeln!(out, "\nSummary:");
        let _ = writeln!(out, "  Total flags: {}", summary.total);
        let _ = writeln!(out, "  Today: {}", summary.today);
        let _ = writeln!(out, "  This week: {}", summary.this_week);
        let _ = writeln!(out, "  Retrieved at: {}", summary.retrieved_at);

        let _ = writeln!(
            out,
            "\nFlagged tiles (showing {} of {} scanned):",
            listing.flags.len(),
            listing.scanned_count
        );
        let _ = writeln!(out, "{}", rule(RULE_WIDTH));
        let _ = writeln!(
            out,
            "{:<20} {:<25} {:<60} {:<10}",
            "Tile Hash", "Flagged At", "Tile Path", "Status"
        );
        let _ = writeln!(out, "{}", rule(RULE_WIDTH));

        for record in &listing.flags {
            let flagged_at: String = match record.flagged_at.as_deref() {
                Some(ts) if !ts.is_empty() => ts.chars().take(TIME_WIDTH).collect(),
                _ => "N/A".into(),
            };
            let _ = writeln!(
                out,
                "{:<20} {:<25} {:<60} {:<10}",
                truncate_hash(record.tile_hash.as_str()),
                flagged_at,
                truncate_path(or_na(&record.tile_path)),
                record.flag_status.as_str()
            );
        }
    }

    if let Some(next) = &listing.next_cursor {
        let _ = writeln!(
            out,
            "\nMore results available. Use --next-key '{next}' to continue."
        );
    }
    out
}

pub fn render_delete_preview(tile_hashes: &[String]) -> String {
    format!(
        "\nAbout to delete {} tile(s):\n  {}",
        tile_hashes.len(),
        tile_hashes.join("\n  ")
    )
}

pub fn render_delete_report(report: &DeleteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nDeletion summary:");
    let _ = writeln!(out, "  Requested: {}", report.requested);
    let _ = writeln!(out, "  Deleted: {}", report.deleted);
    let _ = writeln!(out, "  Failed: {}", report.failed);

    if !report.details.is_empty() {
        let _ = writeln!(out, "\nDetails:");
        for detail in &report.details {
            let marker = match detail.status {
                DeleteStatus::Deleted => "ok  ",
                DeleteStatus::NotFound | DeleteStatus::Error => "FAIL",
            };
            let _ = writeln!(out, "  {marker} {}: {}", detail.tile_hash, detail.message);
        }
    }
    out
}

pub fn review_banner() -> String {
    format!(
        "Interactive tile review\nOptions: {}\n{}",
        services::ReviewAction::PROMPT,
        rule(60)
    )
}

fn render_tally(out: &mut String, tally: &ReviewTally) {
    let _ = writeln!(out, "   Reviewed: {}", tally.reviewed);
    let _ = writeln!(out, "   Unflagged: {}", tally.unflagged);
    let _ = write!(out, "   Deleted files: {}", tally.files_deleted);
}

pub fn render_review_event(event: &ReviewEvent<'_>) -> String {
    match event {
        ReviewEvent::Tile { position, record } => format!(
            "\nTile {position}\n   Hash: {}\n   Path: {}\n   Flagged: {}",
            record.tile_hash,
            or_na(&record.tile_path),
            record.flagged_at.as_deref().map(or_na).unwrap_or("N/A"),
        ),
        ReviewEvent::CursorWarning(message) => format!("Warning: {message}"),
        ReviewEvent::NoPath => "No valid file path available".into(),
        ReviewEvent::Opened { path } => format!("Opened: {path}"),
        ReviewEvent::OpenFailed { path, error } => format!("Failed to open {path}: {error}"),
        ReviewEvent::Unflagged { tile_hash } => format!("Unflagged tile: {tile_hash}"),
        ReviewEvent::UnflagFailed { tile_hash, error } => {
            format!("Failed to unflag tile {tile_hash}: {error}")
        }
        ReviewEvent::FileMissing { path } => format!("File not found: {path}"),
        ReviewEvent::DeleteCancelled => "File deletion cancelled".into(),
        ReviewEvent::FileDeleted { path } => format!("Deleted file: {path}"),
        ReviewEvent::FileDeleteFailed { path, error } => {
            format!("Failed to delete {path}: {error}")
        }
        ReviewEvent::Finished { outcome, tally } => {
            let mut out = String::new();
            match outcome {
                ReviewOutcome::Exhausted => {
                    let _ = writeln!(out, "No more flagged tiles to review.\n\nReview complete:");
                }
                ReviewOutcome::Quit => {
                    let _ = writeln!(out, "\nReview summary:");
                }
                ReviewOutcome::Interrupted => {
                    let _ = writeln!(out, "\nReview interrupted by user\nSummary:");
                }
                ReviewOutcome::Aborted(reason) => {
                    let _ = writeln!(out, "\nReview aborted: {reason}\nSummary:");
                }
            }
            render_tally(&mut out, tally);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domains::{FlagRecord, TileHash};
    use services::{summarize, DeleteDetail};

    #[test]
    fn long_hashes_keep_their_head() {
        assert_eq!(truncate_hash("short"), "short");
        assert_eq!(truncate_hash(&"a".repeat(20)), "a".repeat(20));
        let long = format!("{}XYZ", "b".repeat(18));
        assert_eq!(truncate_hash(&long), format!("{}..", "b".repeat(18)));
    }

    #[test]
    fn long_paths_keep_their_tail() {
        let path = format!("/srv/{}/tile.png", "d".repeat(80));
        let shown = truncate_path(&path);
        assert_eq!(shown.chars().count(), 60);
        assert!(shown.starts_with(".."));
        assert!(shown.ends_with("/tile.png"));
        assert_eq!(truncate_path("/tiles/a.png"), "/tiles/a.png");
    }

    #[test]
    fn listing_table_shows_rows_and_continuation() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let record = FlagRecord::new(
            TileHash::parse("abc").unwrap(),
            "",
            "ip",
            now,
            chrono::Duration::days(30),
        );
        let listing = FlagListing {
            summary: summarize(std::slice::from_ref(&record), now),
            flags: vec![record],
            scanned_count: 4,
            next_cursor: Some("TOKEN".into()),
            cursor_warning: None,
        };

        let text = render_listing(&listing);
        assert!(text.contains("showing 1 of 4 scanned"));
        assert!(text.contains("2026-10-19T12:00:00 "));
        assert!(text.contains("N/A"));
        assert!(text.contains("--next-key 'TOKEN'"));
    }

    #[test]
    fn empty_listing_says_so() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let listing = FlagListing {
            flags: Vec::new(),
            scanned_count: 0,
            next_cursor: None,
            summary: summarize(&[], now),
            cursor_warning: None,
        };
        assert_eq!(render_listing(&listing), "No flagged tiles found.\n");
    }

    #[test]
    fn delete_report_marks_failures() {
        let report = DeleteReport {
            requested: 2,
            deleted: 1,
            failed: 1,
            details: vec![
                DeleteDetail {
                    tile_hash: "A".into(),
                    status: DeleteStatus::Deleted,
                    message: "Successfully deleted".into(),
                },
                DeleteDetail {
                    tile_hash: "B".into(),
                    status: DeleteStatus::NotFound,
                    message: "Tile not found in database".into(),
                },
            ],
        };
        let text = render_delete_report(&report);
        assert!(text.contains("ok   A: Successfully deleted"));
        assert!(text.contains("FAIL B: Tile not found in database"));
    }

    #[test]
    fn interrupted_review_prints_the_tally() {
        let tally = ReviewTally {
            reviewed: 3,
            unflagged: 1,
            files_deleted: 0,
        };
        let text = render_review_event(&ReviewEvent::Finished {
            outcome: &ReviewOutcome::Interrupted,
            tally,
        });
        assert!(text.contains("interrupted"));
        assert!(text.contains("Reviewed: 3"));
        assert!(text.contains("Unflagged: 1"));
    }
}
