//! Shared test utilities for the salon-site test suite.
//!
//! Row builders for assembling [`RawTables`] in code, a canonical small
//! fixture (one salon in Austin, Texas), lookup helpers that panic with a
//! clear message on a miss, and a writer for a minimal CSV data directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut tables = texas_austin_tables();
//! tables.salons.push(salon_row("101", "Second Salon"));
//! let (graph, stats) = build_default(tables);
//!
//! let city = find_city(&graph, "Austin");
//! assert_eq!(city.salon_count, 1);
//! assert_eq!(stats.orphans, 1);
//! ```

use std::fs;
use std::path::Path;

use crate::graph::{self, BuildOptions, BuildStats, Category, City, Graph, Salon, State};
use crate::source::{
    AmenityRow, CategoryRow, CityRow, CitySalonRow, DetailRow, PaymentRow, RawTables,
    SalonCategoryRow, SalonRow, StateRow,
};

// =========================================================================
// Row builders
// =========================================================================

pub fn salon_row(id: &str, title: &str) -> SalonRow {
    SalonRow {
        id: id.to_string(),
        title: title.to_string(),
        ..SalonRow::default()
    }
}

pub fn state_row(id: &str, name: &str) -> StateRow {
    StateRow {
        id: id.to_string(),
        name: name.to_string(),
        slug: None,
    }
}

pub fn city_row(id: &str, name: &str, state_id: &str) -> CityRow {
    CityRow {
        id: id.to_string(),
        name: name.to_string(),
        slug: None,
        state_id: state_id.to_string(),
    }
}

pub fn category_row(id: &str, name: &str) -> CategoryRow {
    CategoryRow {
        id: id.to_string(),
        name: name.to_string(),
        slug: None,
    }
}

pub fn amenity_row(id: &str, name: &str) -> AmenityRow {
    AmenityRow {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn payment_row(id: &str, name: &str) -> PaymentRow {
    PaymentRow {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn detail_row(salon_id: &str, key: &str, value: &str) -> DetailRow {
    DetailRow {
        beauty_salon_id: salon_id.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub fn city_link(salon_id: &str, city_id: &str) -> CitySalonRow {
    CitySalonRow {
        beauty_salon_id: salon_id.to_string(),
        city_id: city_id.to_string(),
    }
}

pub fn category_link(salon_id: &str, category_id: &str) -> SalonCategoryRow {
    SalonCategoryRow {
        beauty_salon_id: salon_id.to_string(),
        category_id: category_id.to_string(),
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// State 1 "Texas", city 10 "Austin", category 5 "Manicure" and salon 100
/// "Jane's Nails & Spa" linked to both.
pub fn texas_austin_tables() -> RawTables {
    RawTables {
        salons: vec![salon_row("100", "Jane's Nails & Spa")],
        states: vec![state_row("1", "Texas")],
        cities: vec![city_row("10", "Austin", "1")],
        categories: vec![category_row("5", "Manicure")],
        city_salons: vec![city_link("100", "10")],
        salon_categories: vec![category_link("100", "5")],
        ..RawTables::default()
    }
}

/// `salon_count` salons spread over one state and one city.
pub fn bulk_tables(salon_count: usize) -> RawTables {
    let mut tables = RawTables {
        states: vec![state_row("1", "Texas")],
        cities: vec![city_row("10", "Austin", "1")],
        ..RawTables::default()
    };
    for i in 0..salon_count {
        let id = format!("s{i}");
        tables.salons.push(salon_row(&id, &format!("Salon {i}")));
        tables.city_salons.push(city_link(&id, "10"));
    }
    tables
}

/// Build with default options.
pub fn build_default(tables: RawTables) -> (Graph, BuildStats) {
    graph::build(tables, &BuildOptions::default())
}

/// Write all thirteen CSV tables into `dir`: two salons, one state, one
/// city, and a single city link (so the second salon is an orphan).
pub fn write_minimal_tables(dir: &Path) {
    let files = [
        (
            "beauty_salon.csv",
            "id,title,slug,address,telephone\n\
             1,Polish Palace,,12 Main St,555-0100\n\
             2,Lonely Nails,,,\n",
        ),
        ("state.csv", "id,state,slug\n1,Texas,\n"),
        ("city.csv", "id,city,slug,state_id\n10,Austin,,1\n"),
        ("category.csv", "id,category,slug\n"),
        ("amenity.csv", "id,amenity\n"),
        ("payment.csv", "id,payment\n"),
        ("beauty_salon_detail.csv", "beauty_salon_id,key,value\n"),
        ("image.csv", "beauty_salon_id,path\n"),
        (
            "review.csv",
            "beauty_salon_id,review,author,time,rating_stars\n",
        ),
        ("city_x_beauty_salon.csv", "beauty_salon_id,city_id\n1,10\n"),
        ("beauty_salon_x_category.csv", "beauty_salon_id,category_id\n"),
        ("amenity_x_beauty_salon.csv", "beauty_salon_id,amenity_id\n"),
        ("payment_x_beauty_salon.csv", "beauty_salon_id,payment_id\n"),
    ];
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

// =========================================================================
// Graph lookups, panicking with a clear message on miss
// =========================================================================

/// Find a salon by id. Panics if not found.
pub fn find_salon<'a>(graph: &'a Graph, id: &str) -> &'a Salon {
    graph
        .salons()
        .iter()
        .find(|s| s.id == id)
        .unwrap_or_else(|| {
            let ids: Vec<&str> = graph.salons().iter().map(|s| s.id.as_str()).collect();
            panic!("salon '{id}' not found. Available: {ids:?}")
        })
}

/// Find a city by name. Panics if not found.
pub fn find_city<'a>(graph: &'a Graph, name: &str) -> &'a City {
    graph
        .cities()
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = graph.cities().iter().map(|c| c.name.as_str()).collect();
            panic!("city '{name}' not found. Available: {names:?}")
        })
}

/// Find a state by name. Panics if not found.
pub fn find_state<'a>(graph: &'a Graph, name: &str) -> &'a State {
    graph
        .states()
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = graph.states().iter().map(|s| s.name.as_str()).collect();
            panic!("state '{name}' not found. Available: {names:?}")
        })
}

/// Find a category by name. Panics if not found.
pub fn find_category<'a>(graph: &'a Graph, name: &str) -> &'a Category {
    graph
        .categories()
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = graph.categories().iter().map(|c| c.name.as_str()).collect();
            panic!("category '{name}' not found. Available: {names:?}")
        })
}

// =========================================================================
// Output helpers
// =========================================================================

/// Read a generated file relative to the output root. Panics if missing.
pub fn read_output(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel))
        .unwrap_or_else(|e| panic!("cannot read output file '{rel}': {e}"))
}
