//! Site emission: URLs, publishability and writing the output tree.
//!
//! Stage 3 of the build. Decides which entities get a page, where each page
//! lives, and writes everything under the output directory:
//!
//! ```text
//! public/
//! ├── salon/{slug}/index.html
//! ├── cities/index.html          # all cities, grouped by state
//! ├── cities/{slug}/index.html
//! ├── states/index.html
//! ├── states/{slug}/index.html
//! ├── categories/index.html
//! ├── categories/{slug}/index.html
//! ├── search-index.html
//! ├── sitemap.html
//! ├── sitemap.xml | sitemap-index.xml
//! ├── sitemaps/sitemap*.xml
//! ├── robots.txt
//! └── assets/css/styles.css
//! ```
//!
//! ## Publishability
//!
//! - Salons: always (the graph guarantees a slug).
//! - Cities and categories: at least one salon.
//! - States: at least one city in the hierarchy.
//!
//! Only publishable entities get pages, sitemap entries or links.
//!
//! ## Failure isolation
//!
//! Entity pages are rendered and written in parallel. A page that fails to
//! write is logged with the entity id and name and counted in the
//! [`EmitReport`]; the rest of the batch carries on. Failures writing the
//! shared files (stylesheet, index pages, sitemaps) abort the build.

use crate::config::{self, ColorConfig, SiteConfig, SiteSection};
use crate::graph::{Category, City, Graph, Salon, State};
use crate::render;
use crate::sitemap::{self, SitemapError, SitemapPlan};
use crate::types::EntityKind;
use chrono::NaiveDate;
use maud::Markup;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),
    #[error("Refusing to clean {output}: it contains {protected}")]
    UnsafeClean { output: PathBuf, protected: PathBuf },
}

const STATIC_CSS: &str = include_str!("../static/styles.css");

/// Output-relative path of the generated stylesheet.
pub const STYLESHEET_PATH: &str = "assets/css/styles.css";

/// Files that survive cleaning the output directory.
const KEEP_ON_CLEAN: &[&str] = &[".gitkeep"];

// ============================================================================
// URLs and paths
// ============================================================================

/// Root URL of a kind, e.g. `/cities/`.
pub fn index_url(kind: EntityKind) -> String {
    format!("/{}/", kind.url_segment())
}

/// Site-relative URL of an entity page, e.g. `/cities/austin/`.
///
/// An empty slug yields the kind's root URL.
pub fn entity_url(kind: EntityKind, slug: &str) -> String {
    if slug.is_empty() {
        warn!("Empty {kind} slug, linking to {}", index_url(kind));
        return index_url(kind);
    }
    format!("/{}/{}/", kind.url_segment(), slug)
}

/// Output-relative file path of an entity page, e.g. `cities/austin/index.html`.
pub fn entity_path(kind: EntityKind, slug: &str) -> PathBuf {
    let dir = PathBuf::from(kind.url_segment());
    if slug.is_empty() {
        warn!("Empty {kind} slug, writing to {}/index.html", kind.url_segment());
        return dir.join("index.html");
    }
    dir.join(slug).join("index.html")
}

/// An entity that may get its own page.
pub trait Publishable {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn slug(&self) -> &str;
    fn is_publishable(&self) -> bool;

    fn url(&self) -> String {
        entity_url(Self::KIND, self.slug())
    }

    fn output_path(&self) -> PathBuf {
        entity_path(Self::KIND, self.slug())
    }
}

impl Publishable for Salon {
    const KIND: EntityKind = EntityKind::Salon;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn is_publishable(&self) -> bool {
        true
    }
}

impl Publishable for City {
    const KIND: EntityKind = EntityKind::City;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn is_publishable(&self) -> bool {
        !self.salons.is_empty()
    }
}

impl Publishable for State {
    const KIND: EntityKind = EntityKind::State;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn is_publishable(&self) -> bool {
        !self.cities.is_empty()
    }
}

impl Publishable for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn is_publishable(&self) -> bool {
        !self.salons.is_empty()
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Page counts for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    /// Entities of this kind in the graph.
    pub total: usize,
    pub publishable: usize,
    /// Pages actually written.
    pub generated: usize,
}

impl KindReport {
    pub fn failed(&self) -> usize {
        self.publishable - self.generated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    /// One entry per kind: salons, cities, states, categories.
    pub kinds: Vec<KindReport>,
    /// Shared pages written: kind indexes, search index, HTML sitemap.
    pub index_pages: usize,
}

impl EmitReport {
    pub fn generated(&self) -> usize {
        self.kinds.iter().map(|k| k.generated).sum::<usize>() + self.index_pages
    }

    pub fn failed(&self) -> usize {
        self.kinds.iter().map(KindReport::failed).sum()
    }

    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Everything [`build_site`] wrote.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub pages: EmitReport,
    pub sitemap: SitemapPlan,
}

#[derive(Debug, Clone)]
pub struct SiteOptions {
    /// Empty the output directory first (keeping `.gitkeep`).
    pub clean: bool,
    /// `lastmod` for every sitemap entry.
    pub build_date: NaiveDate,
    /// Paths that cleaning must never delete, such as the config directory
    /// and the data source. Cleaning an output directory that contains one of
    /// them is an error.
    pub protected: Vec<PathBuf>,
}

// ============================================================================
// Building
// ============================================================================

/// Write the complete site for `graph` into `output_dir`.
pub fn build_site(
    graph: &Graph,
    config: &SiteConfig,
    output_dir: &Path,
    options: &SiteOptions,
) -> Result<SiteReport, SiteError> {
    prepare_output(output_dir, options.clean, &options.protected)?;
    write_stylesheet(output_dir, &config.colors)?;

    let pages = emit(graph, &config.site, output_dir)?;
    let plan = sitemap::write_sitemaps(graph, config, output_dir, options.build_date)?;
    sitemap::write_robots(&plan, config, output_dir)?;

    info!(
        "Wrote {} pages and {} sitemap file(s) to {}",
        pages.generated(),
        plan.chunks.len(),
        output_dir.display()
    );
    Ok(SiteReport {
        pages,
        sitemap: plan,
    })
}

/// Create the output directory, emptying it first when `clean` is set.
pub fn prepare_output(
    output_dir: &Path,
    clean: bool,
    protected: &[PathBuf],
) -> Result<(), SiteError> {
    if clean && output_dir.exists() {
        check_clean_target(output_dir, protected)?;
        let removed = clean_output(output_dir)?;
        debug!("Removed {} entries from {}", removed, output_dir.display());
    }
    fs::create_dir_all(output_dir)?;
    Ok(())
}

/// Fail when any existing protected path lies inside `output_dir`.
fn check_clean_target(output_dir: &Path, protected: &[PathBuf]) -> Result<(), SiteError> {
    let output = output_dir.canonicalize()?;
    for path in protected {
        let Ok(resolved) = path.canonicalize() else {
            continue;
        };
        if resolved.starts_with(&output) {
            return Err(SiteError::UnsafeClean {
                output: output_dir.to_path_buf(),
                protected: path.clone(),
            });
        }
    }
    Ok(())
}

/// Remove everything in `dir` except the entries in `KEEP_ON_CLEAN`.
///
/// Returns the number of top-level entries removed.
pub fn clean_output(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if KEEP_ON_CLEAN.iter().any(|k| name == *k) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Write `assets/css/styles.css`: color variables followed by the base styles.
pub fn write_stylesheet(output_dir: &Path, colors: &ColorConfig) -> std::io::Result<()> {
    let path = output_dir.join(STYLESHEET_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let css = format!("{}\n\n{}", config::generate_color_css(colors), STATIC_CSS);
    fs::write(&path, css)
}

/// Render and write every entity page and the shared index pages.
pub fn emit(graph: &Graph, site: &SiteSection, output_dir: &Path) -> Result<EmitReport, SiteError> {
    let kinds = vec![
        emit_kind(graph.salons(), output_dir, |s| {
            render::render_salon_page(graph, site, s)
        }),
        emit_kind(graph.cities(), output_dir, |c| {
            render::render_city_page(graph, site, c)
        }),
        emit_kind(graph.states(), output_dir, |s| {
            render::render_state_page(graph, site, s)
        }),
        emit_kind(graph.categories(), output_dir, |c| {
            render::render_category_page(graph, site, c)
        }),
    ];

    let shared: [(PathBuf, Markup); 5] = [
        (
            PathBuf::from(EntityKind::State.url_segment()).join("index.html"),
            render::render_states_index(graph, site),
        ),
        (
            PathBuf::from(EntityKind::City.url_segment()).join("index.html"),
            render::render_cities_index(graph, site),
        ),
        (
            PathBuf::from(EntityKind::Category.url_segment()).join("index.html"),
            render::render_categories_index(graph, site),
        ),
        (
            PathBuf::from("search-index.html"),
            render::render_search_index(graph, site),
        ),
        (
            PathBuf::from("sitemap.html"),
            render::render_html_sitemap(graph, site),
        ),
    ];
    let index_pages = shared.len();
    for (rel, markup) in shared {
        write_page(&output_dir.join(&rel), markup)?;
        debug!("Wrote {}", rel.display());
    }

    let report = EmitReport { kinds, index_pages };
    if report.failed() > 0 {
        warn!("{} page(s) failed to write", report.failed());
    }
    Ok(report)
}

/// Write the pages of one kind in parallel. Failures are logged per entity.
fn emit_kind<T, F>(entities: &[T], output_dir: &Path, render: F) -> KindReport
where
    T: Publishable + Sync,
    F: Fn(&T) -> Markup + Sync,
{
    let publishable: Vec<&T> = entities.iter().filter(|e| e.is_publishable()).collect();

    let generated = publishable
        .par_iter()
        .filter(|entity| {
            let entity: &T = entity;
            if entity.slug().is_empty() {
                // Its path would be the kind's index page
                error!(
                    "{} {} ({:?}) has no slug, page not written",
                    T::KIND,
                    entity.id(),
                    entity.display_name()
                );
                return false;
            }
            let path = output_dir.join(entity.output_path());
            match write_page(&path, render(entity)) {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        "Failed to write {} {} ({:?}) to {}: {}",
                        T::KIND,
                        entity.id(),
                        entity.display_name(),
                        path.display(),
                        e
                    );
                    false
                }
            }
        })
        .count();

    info!(
        "Generated {}/{} {} pages",
        generated,
        publishable.len(),
        T::KIND
    );
    KindReport {
        kind: T::KIND,
        total: entities.len(),
        publishable: publishable.len(),
        generated,
    }
}

fn write_page(path: &Path, markup: Markup) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, markup.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::types::SalonIdx;
    use tempfile::TempDir;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    fn options() -> SiteOptions {
        SiteOptions {
            clean: true,
            build_date: test_date(),
            protected: Vec::new(),
        }
    }

    #[test]
    fn entity_urls_per_kind() {
        assert_eq!(entity_url(EntityKind::Salon, "janes"), "/salon/janes/");
        assert_eq!(entity_url(EntityKind::City, "austin"), "/cities/austin/");
        assert_eq!(entity_url(EntityKind::State, "texas"), "/states/texas/");
        assert_eq!(entity_url(EntityKind::Category, "gel"), "/categories/gel/");
    }

    #[test]
    fn empty_slug_falls_back_to_kind_root() {
        assert_eq!(entity_url(EntityKind::City, ""), "/cities/");
        assert_eq!(
            entity_path(EntityKind::City, ""),
            PathBuf::from("cities/index.html")
        );
    }

    #[test]
    fn entity_paths_end_in_index_html() {
        assert_eq!(
            entity_path(EntityKind::Salon, "janes"),
            PathBuf::from("salon/janes/index.html")
        );
        assert_eq!(
            entity_path(EntityKind::Category, "gel"),
            PathBuf::from("categories/gel/index.html")
        );
    }

    #[test]
    fn publishability_rules() {
        let mut tables = texas_austin_tables();
        tables.states.push(state_row("2", "Empty State"));
        tables.states.push(state_row("3", "Quiet State"));
        tables.cities.push(city_row("30", "Quiet Town", "3"));
        tables.categories.push(category_row("6", "Unused"));
        let (graph, _) = build_default(tables);

        assert!(find_salon(&graph, "100").is_publishable());
        assert!(find_city(&graph, "Austin").is_publishable());
        assert!(!find_city(&graph, "Quiet Town").is_publishable());
        assert!(find_state(&graph, "Texas").is_publishable());
        assert!(!find_state(&graph, "Empty State").is_publishable());
        // A state with a city but no salons still gets a page
        assert!(find_state(&graph, "Quiet State").is_publishable());
        assert!(find_category(&graph, "Manicure").is_publishable());
        assert!(!find_category(&graph, "Unused").is_publishable());
    }

    #[test]
    fn emit_writes_publishable_pages_only() {
        let mut tables = texas_austin_tables();
        tables.categories.push(category_row("6", "Unused"));
        let (graph, _) = build_default(tables);
        let tmp = TempDir::new().unwrap();

        let report = emit(&graph, &SiteSection::default(), tmp.path()).unwrap();

        assert!(tmp.path().join("salon/janes-nails-spa/index.html").exists());
        assert!(tmp.path().join("cities/austin/index.html").exists());
        assert!(tmp.path().join("states/texas/index.html").exists());
        assert!(tmp.path().join("categories/manicure/index.html").exists());
        assert!(!tmp.path().join("categories/unused").exists());
        assert!(tmp.path().join("search-index.html").exists());

        let categories = report.kind(EntityKind::Category).unwrap();
        assert_eq!(categories.total, 2);
        assert_eq!(categories.publishable, 1);
        assert_eq!(categories.generated, 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.generated(), 4 + 5);
    }

    #[test]
    fn failed_page_does_not_stop_batch() {
        let (graph, _) = build_default(bulk_tables(3));
        let tmp = TempDir::new().unwrap();
        // A file where a page directory should go makes that one write fail
        fs::create_dir_all(tmp.path().join("salon")).unwrap();
        fs::write(tmp.path().join("salon/salon-1"), "in the way").unwrap();

        let report = emit(&graph, &SiteSection::default(), tmp.path()).unwrap();

        let salons = report.kind(EntityKind::Salon).unwrap();
        assert_eq!(salons.publishable, 3);
        assert_eq!(salons.generated, 2);
        assert_eq!(salons.failed(), 1);
        assert!(tmp.path().join("salon/salon-0/index.html").exists());
        assert!(tmp.path().join("salon/salon-2/index.html").exists());
    }

    #[test]
    fn clean_output_keeps_gitkeep() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitkeep"), "").unwrap();
        fs::write(tmp.path().join("stale.html"), "old").unwrap();
        fs::create_dir_all(tmp.path().join("salon/old")).unwrap();

        let removed = clean_output(tmp.path()).unwrap();

        assert_eq!(removed, 2);
        assert!(tmp.path().join(".gitkeep").exists());
        assert!(!tmp.path().join("stale.html").exists());
        assert!(!tmp.path().join("salon").exists());
    }

    #[test]
    fn prepare_output_without_clean_keeps_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.txt"), "x").unwrap();
        prepare_output(tmp.path(), false, &[]).unwrap();
        assert!(tmp.path().join("keep.txt").exists());
    }

    #[test]
    fn clean_refuses_output_holding_config_or_data() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("config.toml");
        fs::write(&config, "").unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        let data = tmp.path().join("data/data.zip");
        fs::write(&data, "zip").unwrap();

        let result = prepare_output(tmp.path(), true, &[tmp.path().to_path_buf()]);
        assert!(matches!(result, Err(SiteError::UnsafeClean { .. })));
        let result = prepare_output(tmp.path(), true, &[data.clone()]);
        assert!(matches!(result, Err(SiteError::UnsafeClean { .. })));
        assert!(config.exists());
        assert!(data.exists());
    }

    #[test]
    fn clean_allowed_beside_protected_paths() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data.zip");
        fs::write(&data, "zip").unwrap();
        let out = tmp.path().join("public");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.html"), "old").unwrap();

        prepare_output(&out, true, &[tmp.path().to_path_buf(), data.clone()]).unwrap();
        assert!(!out.join("old.html").exists());
        assert!(data.exists());
    }

    #[test]
    fn entity_without_slug_is_not_written_over_index() {
        let tmp = TempDir::new().unwrap();
        let nameless = Category {
            id: "7".to_string(),
            name: "???".to_string(),
            slug: String::new(),
            salons: vec![SalonIdx(0)],
            salon_count: 1,
        };

        let report = emit_kind(std::slice::from_ref(&nameless), tmp.path(), |_| {
            maud::html! { p { "page" } }
        });

        assert_eq!(report.publishable, 1);
        assert_eq!(report.generated, 0);
        assert_eq!(report.failed(), 1);
        assert!(!tmp.path().join("categories/index.html").exists());
    }

    #[test]
    fn stylesheet_has_color_variables() {
        let tmp = TempDir::new().unwrap();
        write_stylesheet(tmp.path(), &ColorConfig::default()).unwrap();
        let css = read_output(tmp.path(), STYLESHEET_PATH);
        assert!(css.starts_with(":root {"));
        assert!(css.contains("--primary-color: #be185d"));
    }

    #[test]
    fn build_site_writes_full_tree() {
        let (graph, _) = build_default(texas_austin_tables());
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("public");

        let report = build_site(&graph, &SiteConfig::default(), &out, &options()).unwrap();

        assert!(!report.sitemap.uses_index());
        for rel in [
            "sitemap.xml",
            "sitemaps/sitemap.xml",
            "robots.txt",
            "sitemap.html",
            "states/index.html",
            "cities/index.html",
            "categories/index.html",
            STYLESHEET_PATH,
        ] {
            assert!(out.join(rel).exists(), "missing {rel}");
        }
    }
}
