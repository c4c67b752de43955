//! XML sitemaps and `robots.txt`.
//!
//! Every publishable URL becomes one [`SitemapEntry`], in a fixed order:
//!
//! | Entries | Priority | Change frequency |
//! |---------|----------|------------------|
//! | home `/` | 1.0 | weekly |
//! | static pages (`/about/`, ...) | 0.8 | monthly |
//! | `/states/`, `/cities/`, `/categories/` | 0.9 | weekly |
//! | states | 0.8 | weekly |
//! | cities | 0.7 | weekly |
//! | categories | 0.7 | weekly |
//! | salons | 0.6 | monthly |
//!
//! Entries are split into chunks of `sitemap.chunk_size` URLs. A single chunk
//! is written to `sitemaps/sitemap.xml` and copied to the top-level
//! `sitemap.xml`. More than one chunk is written as `sitemaps/sitemap-N.xml`
//! (1-based) with a top-level `sitemap-index.xml` pointing at each file.
//! `robots.txt` names whichever top-level file the [`SitemapPlan`] chose, so
//! the two never disagree.
//!
//! The XML is rendered with maud like the HTML pages, which takes care of
//! escaping `&` and `<` in URLs.

use crate::config::SiteConfig;
use crate::graph::Graph;
use crate::site::{Publishable, index_url};
use crate::types::EntityKind;
use chrono::NaiveDate;
use maud::{PreEscaped, html};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Directory (relative to the output root) holding the chunk files.
pub const SITEMAP_DIR: &str = "sitemaps";
pub const SINGLE_SITEMAP: &str = "sitemap.xml";
pub const SITEMAP_INDEX: &str = "sitemap-index.xml";
pub const HTML_SITEMAP: &str = "sitemap.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Weekly,
    Monthly,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapEntry {
    /// Absolute URL.
    pub loc: String,
    /// `YYYY-MM-DD`.
    pub lastmod: String,
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

/// One sitemap file.
#[derive(Debug, Clone, Serialize)]
pub struct SitemapChunk {
    pub file_name: String,
    pub entries: Vec<SitemapEntry>,
}

/// How the entries were split into files.
#[derive(Debug, Clone, Serialize)]
pub struct SitemapPlan {
    pub chunks: Vec<SitemapChunk>,
}

impl SitemapPlan {
    /// More than one chunk, so a sitemap index is needed.
    pub fn uses_index(&self) -> bool {
        self.chunks.len() > 1
    }

    /// The top-level file robots.txt should point at.
    pub fn root_file(&self) -> &'static str {
        if self.uses_index() {
            SITEMAP_INDEX
        } else {
            SINGLE_SITEMAP
        }
    }

    pub fn url_count(&self) -> usize {
        self.chunks.iter().map(|c| c.entries.len()).sum()
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Every sitemap entry for the graph, in output order.
pub fn collect_entries(graph: &Graph, config: &SiteConfig, date: NaiveDate) -> Vec<SitemapEntry> {
    let base = config.site.base_url.as_str();
    let lastmod = date.format("%Y-%m-%d").to_string();
    let entry = |path: &str, priority: f32, changefreq: ChangeFreq| SitemapEntry {
        loc: format!("{base}{path}"),
        lastmod: lastmod.clone(),
        changefreq,
        priority,
    };

    let mut entries = vec![entry("/", 1.0, ChangeFreq::Weekly)];
    for page in &config.site.static_pages {
        entries.push(entry(&format!("/{page}/"), 0.8, ChangeFreq::Monthly));
    }
    for kind in [EntityKind::State, EntityKind::City, EntityKind::Category] {
        entries.push(entry(&index_url(kind), 0.9, ChangeFreq::Weekly));
    }
    entries.extend(
        graph
            .states()
            .iter()
            .filter(|s| s.is_publishable())
            .map(|s| entry(&s.url(), 0.8, ChangeFreq::Weekly)),
    );
    entries.extend(
        graph
            .cities()
            .iter()
            .filter(|c| c.is_publishable())
            .map(|c| entry(&c.url(), 0.7, ChangeFreq::Weekly)),
    );
    entries.extend(
        graph
            .categories()
            .iter()
            .filter(|c| c.is_publishable())
            .map(|c| entry(&c.url(), 0.7, ChangeFreq::Weekly)),
    );
    entries.extend(
        graph
            .salons()
            .iter()
            .map(|s| entry(&s.url(), 0.6, ChangeFreq::Monthly)),
    );
    entries
}

/// Split entries into files of at most `chunk_size` URLs.
pub fn partition(entries: Vec<SitemapEntry>, chunk_size: usize) -> SitemapPlan {
    let chunk_size = chunk_size.max(1);
    if entries.len() <= chunk_size {
        return SitemapPlan {
            chunks: vec![SitemapChunk {
                file_name: SINGLE_SITEMAP.to_string(),
                entries,
            }],
        };
    }

    let chunks = entries
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| SitemapChunk {
            file_name: format!("sitemap-{}.xml", i + 1),
            entries: chunk.to_vec(),
        })
        .collect();
    SitemapPlan { chunks }
}

// ============================================================================
// Rendering
// ============================================================================

pub fn render_urlset(entries: &[SitemapEntry]) -> String {
    html! {
        (PreEscaped(XML_DECLARATION))
        urlset xmlns=(SITEMAP_NS) {
            @for e in entries {
                url {
                    loc { (e.loc) }
                    lastmod { (e.lastmod) }
                    changefreq { (e.changefreq.as_str()) }
                    priority { (format!("{:.1}", e.priority)) }
                }
            }
        }
    }
    .into_string()
}

pub fn render_index(plan: &SitemapPlan, base_url: &str, lastmod: &str) -> String {
    html! {
        (PreEscaped(XML_DECLARATION))
        sitemapindex xmlns=(SITEMAP_NS) {
            @for chunk in &plan.chunks {
                sitemap {
                    loc { (base_url) "/" (SITEMAP_DIR) "/" (chunk.file_name) }
                    lastmod { (lastmod) }
                }
            }
        }
    }
    .into_string()
}

/// The full `robots.txt` for a partition plan.
pub fn robots_txt(plan: &SitemapPlan, config: &SiteConfig) -> String {
    let base = &config.site.base_url;
    let mut lines = vec![
        format!("# robots.txt for {}", config.site.name),
        "User-agent: *".to_string(),
        "Allow: /".to_string(),
        String::new(),
    ];
    for rule in &config.sitemap.disallow {
        lines.push(format!("Disallow: {rule}"));
    }
    lines.push(String::new());
    lines.push("# Sitemap locations".to_string());
    lines.push(format!("Sitemap: {base}/{}", plan.root_file()));
    lines.push(format!("Sitemap: {base}/{HTML_SITEMAP}"));
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

// ============================================================================
// Writing
// ============================================================================

/// Collect, partition and write the XML sitemaps. Returns the plan used.
pub fn write_sitemaps(
    graph: &Graph,
    config: &SiteConfig,
    output_dir: &Path,
    date: NaiveDate,
) -> Result<SitemapPlan, SitemapError> {
    let entries = collect_entries(graph, config, date);
    let plan = partition(entries, config.sitemap.chunk_size);
    let lastmod = date.format("%Y-%m-%d").to_string();

    let dir = output_dir.join(SITEMAP_DIR);
    fs::create_dir_all(&dir).map_err(|source| SitemapError::Write {
        path: dir.clone(),
        source,
    })?;
    for chunk in &plan.chunks {
        write_file(&dir.join(&chunk.file_name), &render_urlset(&chunk.entries))?;
        debug!(
            "Wrote {}/{} ({} URLs)",
            SITEMAP_DIR,
            chunk.file_name,
            chunk.entries.len()
        );
    }

    let removed = remove_stale_chunks(&dir, &plan)?;
    if removed > 0 {
        debug!("Removed {} stale file(s) from {}", removed, SITEMAP_DIR);
    }

    let (root, stale) = if plan.uses_index() {
        let index = render_index(&plan, &config.site.base_url, &lastmod);
        write_file(&output_dir.join(SITEMAP_INDEX), &index)?;
        (SITEMAP_INDEX, SINGLE_SITEMAP)
    } else {
        let single = dir.join(SINGLE_SITEMAP);
        let top = output_dir.join(SINGLE_SITEMAP);
        fs::copy(&single, &top).map_err(|source| SitemapError::Write { path: top, source })?;
        (SINGLE_SITEMAP, SITEMAP_INDEX)
    };
    // Left over from an earlier build that partitioned differently
    let stale = output_dir.join(stale);
    if stale.exists() {
        fs::remove_file(&stale).map_err(|source| SitemapError::Write {
            path: stale.clone(),
            source,
        })?;
    }

    info!(
        "Sitemap: {} URLs in {} file(s), root {}",
        plan.url_count(),
        plan.chunks.len(),
        root
    );
    Ok(plan)
}

/// Write `robots.txt` for the plan returned by [`write_sitemaps`].
pub fn write_robots(
    plan: &SitemapPlan,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<(), SitemapError> {
    write_file(&output_dir.join("robots.txt"), &robots_txt(plan, config))
}

/// Delete chunk files in `dir` that the plan did not write.
fn remove_stale_chunks(dir: &Path, plan: &SitemapPlan) -> Result<usize, SitemapError> {
    let to_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| SitemapError::Write { path, source }
    };
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(to_error(dir))? {
        let entry = entry.map_err(to_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_chunk_file(&name) || plan.chunks.iter().any(|c| c.file_name == name) {
            continue;
        }
        let path = entry.path();
        fs::remove_file(&path).map_err(to_error(&path))?;
        removed += 1;
    }
    Ok(removed)
}

/// `sitemap.xml` or `sitemap-N.xml`.
fn is_chunk_file(name: &str) -> bool {
    if name == SINGLE_SITEMAP {
        return true;
    }
    name.strip_prefix("sitemap-")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn write_file(path: &Path, contents: &str) -> Result<(), SitemapError> {
    fs::write(path, contents).map_err(|source| SitemapError::Write {
        path: path.to_path_buf(),
        source,
    })
}
