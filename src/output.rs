//! CLI output formatting for all pipeline stages.
//!
//! Output is a short inventory per stage: what was loaded, what the graph
//! builder had to repair, and what was written. Detail that only matters
//! when something went wrong (dangling references, failed pages) is shown as
//! indented context lines under the stage it belongs to, and only when
//! non-zero.
//!
//! # Output Format
//!
//! ## Load
//!
//! ```text
//! Tables (data/data.zip)
//! 001 beauty_salon (1204 rows)
//! 002 state (51 rows)
//! ...
//! ```
//!
//! ## Graph
//!
//! ```text
//! Graph
//!     1204 salons, 388 cities, 51 states, 12 categories
//!     Orphans: 3 salons placed under Unknown
//!     Dangling references: 7
//!         categories: 5
//!         images: 2
//! ```
//!
//! ## Site
//!
//! ```text
//! Pages → public
//!     salons: 1204/1204
//!     cities: 380/380 (388 total)
//!     ...
//!     index pages: 5
//! Sitemap: 1626 URLs in 9 files → sitemap-index.xml
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure
//! and do no I/O.

use crate::graph::{BuildStats, UNKNOWN_NAME};
use crate::site::{KindReport, SiteReport};
use crate::source::RawTables;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Load
// ============================================================================

pub fn format_load_summary(tables: &RawTables, source: &str) -> Vec<String> {
    let mut lines = vec![format!("Tables ({source})")];
    for (i, (name, rows)) in tables.row_counts().into_iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            name,
            plural(rows, "row", "rows")
        ));
    }
    lines
}

pub fn print_load_summary(tables: &RawTables, source: &str) {
    for line in format_load_summary(tables, source) {
        println!("{}", line);
    }
}

// ============================================================================
// Graph
// ============================================================================

pub fn format_build_stats(stats: &BuildStats) -> Vec<String> {
    let mut lines = vec!["Graph".to_string()];
    lines.push(format!(
        "{}{}, {}, {}, {}",
        indent(1),
        plural(stats.salons, "salon", "salons"),
        plural(stats.cities, "city", "cities"),
        plural(stats.states, "state", "states"),
        plural(stats.categories, "category", "categories"),
    ));

    if stats.orphans > 0 {
        lines.push(format!(
            "{}Orphans: {} placed under {}",
            indent(1),
            plural(stats.orphans, "salon", "salons"),
            UNKNOWN_NAME
        ));
    }
    if stats.unlinked_cities > 0 {
        lines.push(format!(
            "{}Cities without a known state: {}",
            indent(1),
            stats.unlinked_cities
        ));
    }
    if stats.city_conflicts > 0 {
        lines.push(format!(
            "{}Salons listed in several cities: {}",
            indent(1),
            stats.city_conflicts
        ));
    }
    if stats.duplicate_ids > 0 {
        lines.push(format!(
            "{}Duplicate ids skipped: {}",
            indent(1),
            stats.duplicate_ids
        ));
    }
    if stats.slug_collisions > 0 {
        lines.push(format!(
            "{}Slugs suffixed to stay unique: {}",
            indent(1),
            stats.slug_collisions
        ));
    }

    let dangling = &stats.dangling;
    if dangling.total() > 0 {
        lines.push(format!(
            "{}Dangling references: {}",
            indent(1),
            dangling.total()
        ));
        let parts = [
            ("city links", dangling.city_links),
            ("categories", dangling.categories),
            ("amenities", dangling.amenities),
            ("payments", dangling.payments),
            ("images", dangling.images),
            ("reviews", dangling.reviews),
            ("details", dangling.details),
        ];
        for (label, n) in parts.into_iter().filter(|(_, n)| *n > 0) {
            lines.push(format!("{}{}: {}", indent(2), label, n));
        }
    }
    lines
}

pub fn print_build_stats(stats: &BuildStats) {
    for line in format_build_stats(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Site
// ============================================================================

fn kind_line(report: &KindReport) -> String {
    let mut line = format!(
        "{}{}: {}/{}",
        indent(1),
        report.kind.plural(),
        report.generated,
        report.publishable
    );
    if report.total != report.publishable {
        line.push_str(&format!(" ({} total)", report.total));
    }
    if report.failed() > 0 {
        line.push_str(&format!(", {} failed", report.failed()));
    }
    line
}

pub fn format_site_report(report: &SiteReport, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![format!("Pages → {}", output_dir.display())];
    for kind in &report.pages.kinds {
        lines.push(kind_line(kind));
    }
    lines.push(format!("{}index pages: {}", indent(1), report.pages.index_pages));

    let plan = &report.sitemap;
    lines.push(format!(
        "Sitemap: {} in {} → {}",
        plural(plan.url_count(), "URL", "URLs"),
        plural(plan.chunks.len(), "file", "files"),
        plan.root_file()
    ));
    if report.pages.failed() > 0 {
        lines.push(format!(
            "{} failed to write (see errors above)",
            plural(report.pages.failed(), "page", "pages")
        ));
    }
    lines
}

pub fn print_site_report(report: &SiteReport, output_dir: &Path) {
    for line in format_site_report(report, output_dir) {
        println!("{}", line);
    }
}
