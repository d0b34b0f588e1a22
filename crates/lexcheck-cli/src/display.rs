//! Terminal rendering for review items, records, and reports.

use std::fmt::Write as _;

use lexcheck_core::{
    CandidateKey, Judgement, JudgmentRecord, Markup, ReviewFilter, ReviewItem, ReviewSummary,
    highlight_excerpt,
};
use lexcheck_store::{BatchReport, ImportReport, MigrationReport};

const MAX_TEXT_CHARS: usize = 600;
const MAX_CONFLICTS_SHOWN: usize = 10;

fn verdict(judgement: Judgement) -> &'static str {
    match judgement {
        Judgement::Unset => "-",
        Judgement::Ok => "OK",
        Judgement::Ng => "NG",
    }
}

fn mark(found: bool) -> &'static str {
    if found { "found" } else { "MISSING" }
}

// ── Review cards ──

/// Render one review item with its highlighted source text and record state.
pub fn render_card(item: &ReviewItem, record: Option<&JudgmentRecord>, markup: &Markup) -> String {
    let h = highlight_excerpt(&item.text, &item.formal, &item.abbr, markup, MAX_TEXT_CHARS);

    let mut out = String::new();
    let _ = writeln!(out, "=== [{}] {} ===", item.top_index, item.key);
    if !item.law_name.is_empty() {
        let _ = writeln!(out, "  {:<10} {}", "law", item.law_name);
    }
    let _ = writeln!(out, "  {:<10} {}  ({})", "formal", item.formal, mark(h.formal_found));
    let _ = writeln!(out, "  {:<10} {}  ({})", "abbr", item.abbr, mark(h.abbr_found));

    let record = record.cloned().unwrap_or_default();
    let _ = write!(out, "  {:<10} {}", "judgement", verdict(record.judgement));
    if record.judgement == Judgement::Ng
        && (!record.correct_formal.is_empty() || !record.correct_abbr.is_empty())
    {
        let _ = write!(out, "  -> {} / {}", record.correct_formal, record.correct_abbr);
    }
    out.push('\n');
    if record.has_memo() {
        let _ = writeln!(out, "  {:<10} {}", "memo", record.memo);
    }
    if !record.timestamp.is_empty() {
        let _ = writeln!(out, "  {:<10} {}", "updated", record.timestamp);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", h.marked_text);
    out
}

pub fn render_record(key: &CandidateKey, record: &JudgmentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{key}");
    let _ = writeln!(out, "  {:<14} {}", "judgement", verdict(record.judgement));
    let _ = writeln!(out, "  {:<14} {}", "correctFormal", record.correct_formal);
    let _ = writeln!(out, "  {:<14} {}", "correctAbbr", record.correct_abbr);
    let _ = writeln!(out, "  {:<14} {}", "memo", record.memo);
    let _ = writeln!(out, "  {:<14} {}", "timestamp", record.timestamp);
    out
}

pub fn render_summary(reviewer: &str, summary: &ReviewSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reviewer {reviewer}");
    for filter in ReviewFilter::ALL {
        let _ = writeln!(out, "  {:<10} {}", filter, summary.count(filter));
    }
    if summary.orphaned > 0 {
        let _ = writeln!(out, "  {:<10} {}  (keys not in dataset)", "orphaned", summary.orphaned);
    }
    out
}

// ── Migration reports ──

pub fn render_migration(report: &MigrationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<20} {:<7} records={} renamed={} conflicts={} malformed={} {}",
        report.reviewer,
        report.previous_scheme,
        report.records,
        report.renamed,
        report.conflicts.len(),
        report.malformed.len(),
        if report.written { "written" } else { "unchanged" },
    );
    for conflict in report.conflicts.iter().take(MAX_CONFLICTS_SHOWN) {
        let _ = writeln!(
            out,
            "    conflict {}: kept {}, dropped {}",
            conflict.key, conflict.kept, conflict.dropped
        );
    }
    if report.conflicts.len() > MAX_CONFLICTS_SHOWN {
        let _ = writeln!(
            out,
            "    ... and {} more",
            report.conflicts.len() - MAX_CONFLICTS_SHOWN
        );
    }
    out
}

pub fn render_import(report: &ImportReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Imported {} records for {} ({} renamed), store now holds {}",
        report.imported, report.reviewer, report.renamed, report.total
    );
    if report.local_renamed > 0 {
        let _ = writeln!(out, "  local store migrated: {} keys renamed", report.local_renamed);
    }
    for conflict in report.conflicts.iter().take(MAX_CONFLICTS_SHOWN) {
        let _ = writeln!(
            out,
            "  conflict {}: kept {}, dropped {}",
            conflict.key, conflict.kept, conflict.dropped
        );
    }
    out
}

pub fn render_batch(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Dataset: {} entries, {} legacy keys",
        report.dataset_entries, report.legacy_keys
    );
    for migrated in &report.migrated {
        out.push_str(&render_migration(migrated));
    }
    for (reviewer, err) in &report.failed {
        let _ = writeln!(out, "  {reviewer:<20} FAILED: {err}");
    }
    let _ = writeln!(
        out,
        "{} stores, {} rewritten, {} conflicts, {} failed",
        report.migrated.len() + report.failed.len(),
        report.written(),
        report.conflicts(),
        report.failed.len()
    );
    out
}
