//! # Salon Site
//!
//! A static site builder for a nail salon directory. A relational export of
//! the directory (one CSV file per table, usually zipped) goes in; a tree of
//! static HTML pages, XML and HTML sitemaps and a `robots.txt` comes out.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Load     data.zip  →  RawTables   (CSV rows, all tables in parallel)
//! 2. Graph    RawTables →  Graph       (linked salons, cities, states, categories)
//! 3. Site     Graph     →  public/     (pages, sitemaps, robots.txt, CSS)
//! ```
//!
//! Each stage is a plain function over the previous stage's output, so the
//! interesting logic (joins, orphan handling, publishability, sitemap
//! partitioning) is unit-tested on values built in code, without touching
//! the filesystem.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Stage 1: reads CSV tables from a zip archive or directory into typed rows |
//! | [`graph`] | Stage 2: joins rows into an arena of linked entities, repairs orphans, counts |
//! | [`site`] | Stage 3: URLs, publishability, parallel page writing, output directory |
//! | [`render`] | Maud templates for every page |
//! | [`sitemap`] | XML sitemap entries, partitioning, index and `robots.txt` |
//! | [`slug`] | Slug rule shared by every URL, plus per-kind uniqueness |
//! | [`config`] | `config.toml` loading, validation, merging, and CSS generation |
//! | [`types`] | Typed entity handles and the page-bearing entity kinds |
//! | [`output`] | CLI output formatting for each stage |
//!
//! # Design Decisions
//!
//! ## Arena and Handles
//!
//! Salons, cities, states and categories refer to each other in both
//! directions. Rather than reference-counted back-pointers, every entity lives
//! in one `Vec` of [`graph::Graph`] and relations are typed indices
//! ([`types::SalonIdx`], [`types::CityIdx`], ...). The graph is built once and
//! then shared read-only across rayon workers.
//!
//! ## Placement Is One Field
//!
//! A salon's city and state are stored together as a [`graph::Placement`],
//! derived from the city. A salon therefore cannot end up in a state that
//! disagrees with its city.
//!
//! ## Nothing Relational Is Fatal
//!
//! Real exports have dangling ids, cities without states and salons without
//! cities. These are dropped or repaired (orphans go to a single synthetic
//! `Unknown` state and city), counted in [`graph::BuildStats`] and shown in
//! the summary. Only a missing or malformed table stops the build.
//!
//! ## Maud for HTML and XML
//!
//! Pages and sitemaps are generated with [Maud](https://maud.lambda.xyz/):
//! templates are checked at compile time and every interpolated value is
//! escaped, which matters when the content is third-party business data.

pub mod config;
pub mod graph;
pub mod output;
pub mod render;
pub mod site;
pub mod sitemap;
pub mod slug;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
