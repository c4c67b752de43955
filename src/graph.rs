//! Entity graph: the join and enrichment stage.
//!
//! Stage 2 of the build. Takes the flat rows from [`source`](crate::source)
//! and turns them into a linked, read-only graph of salons, cities, states
//! and categories that the renderer and the sitemap builder walk.
//!
//! ## Storage
//!
//! Every entity lives in one `Vec` inside [`Graph`]. Relations are typed
//! handles ([`SalonIdx`], [`CityIdx`], ...) into those vectors, so the graph
//! has no reference cycles and can be shared as `&Graph` across rayon workers.
//!
//! ## Construction order
//!
//! [`build`] runs in fixed phases. The id → handle maps and per-salon junction
//! lists are local to the call; only the finished graph escapes.
//!
//! 1. Slugs: every entity gets a clean, unique-within-kind slug.
//! 2. Indexing: id → handle maps for states, cities, categories, amenities,
//!    payments and salons.
//! 3. Hierarchy: each city links to its state; cities whose `state_id` does
//!    not resolve stay out of the hierarchy.
//! 4. Junctions: per-salon category/amenity/payment lists (de-duplicated,
//!    first appearance order) and one city per salon chosen by
//!    [`CityTieBreak`].
//! 5. Placement: a salon is placed when its city resolves and that city has
//!    a state. Placed salons join their city's and state's lists.
//! 6. Orphans: unplaced salons go to one `Unknown` state / `Unknown` city
//!    pair, created at most once and only when needed.
//! 7. Counts: `salon_count` is set from the final lists.
//!
//! Nothing in here fails. Dangling ids, unlinked cities and duplicate ids are
//! dropped, logged and counted in [`BuildStats`].

use crate::slug::{SlugRegistry, slugify};
use crate::source::RawTables;
use crate::types::{AmenityIdx, CategoryIdx, CityIdx, EntityKind, PaymentIdx, SalonIdx, StateIdx};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Name of the synthetic state and city that collect orphaned salons.
pub const UNKNOWN_NAME: &str = "Unknown";
/// Id (and base slug) given to a synthetic Unknown state or city.
pub const UNKNOWN_ID: &str = "unknown";

/// Which row wins when a salon is linked to more than one city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CityTieBreak {
    /// The first `city_x_beauty_salon` row for the salon wins.
    First,
    /// The last row wins.
    #[default]
    Last,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub city_tie_break: CityTieBreak,
}

// ============================================================================
// Entities
// ============================================================================

/// Where a salon sits in the state → city hierarchy.
///
/// City and state are stored together so that the state can never disagree
/// with the city's own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub city: CityIdx,
    pub state: StateIdx,
}

#[derive(Debug, Clone, Serialize)]
pub struct Salon {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub telephone: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub opening_hours: Option<String>,
    pub description: Option<String>,
    pub service_product: Option<String>,
    pub average_star: Option<String>,
    pub placement: Placement,
    pub categories: Vec<CategoryIdx>,
    pub amenities: Vec<AmenityIdx>,
    pub payments: Vec<PaymentIdx>,
    /// Source order; the first image is the hero image.
    pub images: Vec<Image>,
    pub reviews: Vec<Review>,
    pub details: Vec<Detail>,
}

impl Salon {
    pub fn hero_image(&self) -> Option<&Image> {
        self.images.first()
    }

    /// Latitude and longitude, when both parse as numbers.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.as_deref()?.trim().parse().ok()?;
        let lon = self.longitude.as_deref()?.trim().parse().ok()?;
        Some((lat, lon))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// The raw `state_id` column, kept even when it did not resolve.
    pub state_id: String,
    pub state: Option<StateIdx>,
    pub salons: Vec<SalonIdx>,
    pub salon_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub cities: Vec<CityIdx>,
    pub salons: Vec<SalonIdx>,
    pub salon_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub salons: Vec<SalonIdx>,
    pub salon_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Amenity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub text: String,
    pub author: Option<String>,
    pub time: Option<String>,
    /// Whole stars, 0 to 5.
    pub rating_stars: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detail {
    pub key: String,
    pub value: String,
}

// ============================================================================
// Graph
// ============================================================================

/// The finished entity graph. Read-only once [`build`] returns.
///
/// Handles are only valid for the graph that produced them; indexing with a
/// handle from another graph panics or returns the wrong entity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    salons: Vec<Salon>,
    cities: Vec<City>,
    states: Vec<State>,
    categories: Vec<Category>,
    amenities: Vec<Amenity>,
    payments: Vec<Payment>,
    unknown: Option<Placement>,
}

impl Graph {
    pub fn salons(&self) -> &[Salon] {
        &self.salons
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn salon(&self, idx: SalonIdx) -> &Salon {
        &self.salons[idx.0]
    }

    pub fn city(&self, idx: CityIdx) -> &City {
        &self.cities[idx.0]
    }

    pub fn state(&self, idx: StateIdx) -> &State {
        &self.states[idx.0]
    }

    pub fn category(&self, idx: CategoryIdx) -> &Category {
        &self.categories[idx.0]
    }

    pub fn amenity(&self, idx: AmenityIdx) -> &Amenity {
        &self.amenities[idx.0]
    }

    pub fn payment(&self, idx: PaymentIdx) -> &Payment {
        &self.payments[idx.0]
    }

    pub fn salon_city(&self, salon: &Salon) -> &City {
        self.city(salon.placement.city)
    }

    pub fn salon_state(&self, salon: &Salon) -> &State {
        self.state(salon.placement.state)
    }

    pub fn city_state(&self, city: &City) -> Option<&State> {
        city.state.map(|s| self.state(s))
    }

    /// The synthetic Unknown pair, if any salon needed it.
    pub fn unknown_placement(&self) -> Option<Placement> {
        self.unknown
    }

}

// ============================================================================
// Build statistics
// ============================================================================

/// Rows that referenced something that does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DanglingRefs {
    /// `city_x_beauty_salon` rows with an unknown salon, or a chosen city id
    /// that does not exist.
    pub city_links: usize,
    pub categories: usize,
    pub amenities: usize,
    pub payments: usize,
    pub images: usize,
    pub reviews: usize,
    pub details: usize,
}

impl DanglingRefs {
    pub fn total(&self) -> usize {
        self.city_links
            + self.categories
            + self.amenities
            + self.payments
            + self.images
            + self.reviews
            + self.details
    }
}

/// What [`build`] did with the input, for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub salons: usize,
    pub states: usize,
    pub cities: usize,
    pub categories: usize,
    /// Rows skipped because an earlier row of the same table had the same id.
    pub duplicate_ids: usize,
    /// Cities whose `state_id` did not resolve.
    pub unlinked_cities: usize,
    pub dangling: DanglingRefs,
    /// Salons linked to more than one distinct city, counted once each.
    pub city_conflicts: usize,
    /// Slugs that had to be suffixed to stay unique.
    pub slug_collisions: usize,
    /// Salons moved to the Unknown pair.
    pub orphans: usize,
}

// ============================================================================
// Building
// ============================================================================

/// Build the entity graph from loaded tables.
pub fn build(tables: RawTables, options: &BuildOptions) -> (Graph, BuildStats) {
    let mut stats = BuildStats::default();

    // Phase 1 + 2: entities, slugs and id maps.
    let mut state_slugs = SlugRegistry::new();
    let mut states: Vec<State> = Vec::with_capacity(tables.states.len());
    let mut state_by_id: HashMap<String, StateIdx> = HashMap::new();
    for row in tables.states {
        if state_by_id.contains_key(&row.id) {
            warn!("Duplicate state id {:?}, skipping {:?}", row.id, row.name);
            stats.duplicate_ids += 1;
            continue;
        }
        let slug = assign_slug(
            &mut state_slugs,
            &mut stats,
            EntityKind::State,
            &row.id,
            row.slug.as_deref(),
            &row.name,
        );
        let idx = StateIdx(states.len());
        state_by_id.insert(row.id.clone(), idx);
        states.push(State {
            id: row.id,
            name: row.name,
            slug,
            cities: Vec::new(),
            salons: Vec::new(),
            salon_count: 0,
        });
    }

    // Phase 3 happens while cities are indexed: each city resolves its state.
    let mut city_slugs = SlugRegistry::new();
    let mut cities: Vec<City> = Vec::with_capacity(tables.cities.len());
    let mut city_by_id: HashMap<String, CityIdx> = HashMap::new();
    for row in tables.cities {
        if city_by_id.contains_key(&row.id) {
            warn!("Duplicate city id {:?}, skipping {:?}", row.id, row.name);
            stats.duplicate_ids += 1;
            continue;
        }
        let slug = assign_slug(
            &mut city_slugs,
            &mut stats,
            EntityKind::City,
            &row.id,
            row.slug.as_deref(),
            &row.name,
        );
        let idx = CityIdx(cities.len());
        let state = state_by_id.get(&row.state_id).copied();
        match state {
            Some(s) => states[s.0].cities.push(idx),
            None => {
                warn!(
                    "City {:?} ({}) references unknown state {:?}, leaving it out of the hierarchy",
                    row.name, row.id, row.state_id
                );
                stats.unlinked_cities += 1;
            }
        }
        city_by_id.insert(row.id.clone(), idx);
        cities.push(City {
            id: row.id,
            name: row.name,
            slug,
            state_id: row.state_id,
            state,
            salons: Vec::new(),
            salon_count: 0,
        });
    }

    let mut category_slugs = SlugRegistry::new();
    let mut categories: Vec<Category> = Vec::with_capacity(tables.categories.len());
    let mut category_by_id: HashMap<String, CategoryIdx> = HashMap::new();
    for row in tables.categories {
        if category_by_id.contains_key(&row.id) {
            warn!("Duplicate category id {:?}, skipping {:?}", row.id, row.name);
            stats.duplicate_ids += 1;
            continue;
        }
        let slug = assign_slug(
            &mut category_slugs,
            &mut stats,
            EntityKind::Category,
            &row.id,
            row.slug.as_deref(),
            &row.name,
        );
        category_by_id.insert(row.id.clone(), CategoryIdx(categories.len()));
        categories.push(Category {
            id: row.id,
            name: row.name,
            slug,
            salons: Vec::new(),
            salon_count: 0,
        });
    }

    let mut amenities: Vec<Amenity> = Vec::with_capacity(tables.amenities.len());
    let mut amenity_by_id: HashMap<String, AmenityIdx> = HashMap::new();
    for row in tables.amenities {
        if amenity_by_id.contains_key(&row.id) {
            stats.duplicate_ids += 1;
            continue;
        }
        amenity_by_id.insert(row.id.clone(), AmenityIdx(amenities.len()));
        amenities.push(Amenity {
            id: row.id,
            name: row.name,
        });
    }

    let mut payments: Vec<Payment> = Vec::with_capacity(tables.payments.len());
    let mut payment_by_id: HashMap<String, PaymentIdx> = HashMap::new();
    for row in tables.payments {
        if payment_by_id.contains_key(&row.id) {
            stats.duplicate_ids += 1;
            continue;
        }
        payment_by_id.insert(row.id.clone(), PaymentIdx(payments.len()));
        payments.push(Payment {
            id: row.id,
            name: row.name,
        });
    }

    let mut salon_slugs = SlugRegistry::new();
    let mut salon_rows = Vec::with_capacity(tables.salons.len());
    let mut salon_by_id: HashMap<String, usize> = HashMap::new();
    for row in tables.salons {
        if salon_by_id.contains_key(&row.id) {
            warn!("Duplicate salon id {:?}, skipping {:?}", row.id, row.title);
            stats.duplicate_ids += 1;
            continue;
        }
        let slug = assign_slug(
            &mut salon_slugs,
            &mut stats,
            EntityKind::Salon,
            &row.id,
            row.slug.as_deref(),
            &row.title,
        );
        salon_by_id.insert(row.id.clone(), salon_rows.len());
        salon_rows.push((row, slug));
    }

    stats.salons = salon_rows.len();
    stats.states = states.len();
    stats.cities = cities.len();
    stats.categories = categories.len();

    // Phase 4: junctions, keyed by salon position.
    let n = salon_rows.len();

    let mut city_choice: Vec<Option<String>> = vec![None; n];
    let mut conflicted = vec![false; n];
    for row in tables.city_salons {
        let Some(&s) = salon_by_id.get(&row.beauty_salon_id) else {
            stats.dangling.city_links += 1;
            continue;
        };
        let slot = &mut city_choice[s];
        if let Some(existing) = slot.as_mut() {
            if *existing != row.city_id {
                debug!(
                    "Salon {} listed in cities {:?} and {:?}",
                    row.beauty_salon_id, existing, row.city_id
                );
                if !conflicted[s] {
                    conflicted[s] = true;
                    stats.city_conflicts += 1;
                }
                if options.city_tie_break == CityTieBreak::Last {
                    *existing = row.city_id;
                }
            }
        } else {
            *slot = Some(row.city_id);
        }
    }

    let mut salon_categories: Vec<Vec<CategoryIdx>> = vec![Vec::new(); n];
    for row in tables.salon_categories {
        match (
            salon_by_id.get(&row.beauty_salon_id),
            category_by_id.get(&row.category_id),
        ) {
            (Some(&s), Some(&c)) => push_unique(&mut salon_categories[s], c),
            _ => stats.dangling.categories += 1,
        }
    }

    let mut salon_amenities: Vec<Vec<AmenityIdx>> = vec![Vec::new(); n];
    for row in tables.amenity_salons {
        match (
            salon_by_id.get(&row.beauty_salon_id),
            amenity_by_id.get(&row.amenity_id),
        ) {
            (Some(&s), Some(&a)) => push_unique(&mut salon_amenities[s], a),
            _ => stats.dangling.amenities += 1,
        }
    }

    let mut salon_payments: Vec<Vec<PaymentIdx>> = vec![Vec::new(); n];
    for row in tables.payment_salons {
        match (
            salon_by_id.get(&row.beauty_salon_id),
            payment_by_id.get(&row.payment_id),
        ) {
            (Some(&s), Some(&p)) => push_unique(&mut salon_payments[s], p),
            _ => stats.dangling.payments += 1,
        }
    }

    let mut salon_images: Vec<Vec<Image>> = vec![Vec::new(); n];
    for row in tables.images {
        match salon_by_id.get(&row.beauty_salon_id) {
            Some(&s) => salon_images[s].push(Image { path: row.path }),
            None => stats.dangling.images += 1,
        }
    }

    let mut salon_reviews: Vec<Vec<Review>> = vec![Vec::new(); n];
    for row in tables.reviews {
        match salon_by_id.get(&row.beauty_salon_id) {
            Some(&s) => salon_reviews[s].push(Review {
                text: row.review,
                author: row.author,
                time: row.time,
                rating_stars: row.rating_stars.as_deref().and_then(parse_stars),
            }),
            None => stats.dangling.reviews += 1,
        }
    }

    let mut salon_details: Vec<Vec<Detail>> = vec![Vec::new(); n];
    for row in tables.details {
        match salon_by_id.get(&row.beauty_salon_id) {
            Some(&s) => salon_details[s].push(Detail {
                key: row.key,
                value: row.value,
            }),
            None => stats.dangling.details += 1,
        }
    }

    // Phase 5: placement.
    let placements: Vec<Option<Placement>> = city_choice
        .iter()
        .map(|choice| {
            let city_id = choice.as_ref()?;
            let Some(&city) = city_by_id.get(city_id) else {
                stats.dangling.city_links += 1;
                return None;
            };
            let state = cities[city.0].state?;
            Some(Placement { city, state })
        })
        .collect();

    // Phase 5 + 6: final salons, orphans into the Unknown pair.
    let mut unknown: Option<Placement> = None;
    let mut salons: Vec<Salon> = Vec::with_capacity(n);
    for (i, (row, slug)) in salon_rows.into_iter().enumerate() {
        let placement = match placements[i] {
            Some(p) => p,
            None => {
                stats.orphans += 1;
                debug!("Salon {} ({:?}) has no usable city", row.id, row.title);
                match unknown {
                    Some(p) => p,
                    None => {
                        let p = unknown_pair(
                            &mut states,
                            &mut cities,
                            &mut state_slugs,
                            &mut city_slugs,
                        );
                        unknown = Some(p);
                        p
                    }
                }
            }
        };

        let idx = SalonIdx(i);
        cities[placement.city.0].salons.push(idx);
        states[placement.state.0].salons.push(idx);
        let salon_cats = std::mem::take(&mut salon_categories[i]);
        for c in &salon_cats {
            categories[c.0].salons.push(idx);
        }

        salons.push(Salon {
            id: row.id,
            title: row.title,
            slug,
            address: row.address,
            postal_code: row.postal_code,
            telephone: row.telephone,
            latitude: row.latitude,
            longitude: row.longitude,
            website: row.website,
            email: row.email,
            opening_hours: row.opening_hours,
            description: row.description,
            service_product: row.service_product,
            average_star: row.average_star,
            placement,
            categories: salon_cats,
            amenities: std::mem::take(&mut salon_amenities[i]),
            payments: std::mem::take(&mut salon_payments[i]),
            images: std::mem::take(&mut salon_images[i]),
            reviews: std::mem::take(&mut salon_reviews[i]),
            details: std::mem::take(&mut salon_details[i]),
        });
    }

    // Phase 7: counts.
    for state in &mut states {
        state.salon_count = state.salons.len();
    }
    for city in &mut cities {
        city.salon_count = city.salons.len();
    }
    for category in &mut categories {
        category.salon_count = category.salons.len();
    }

    if stats.orphans > 0 {
        warn!(
            "{} salon(s) without a usable city placed under {}/{}",
            stats.orphans, UNKNOWN_NAME, UNKNOWN_NAME
        );
    }
    if stats.dangling.total() > 0 {
        warn!("Dropped {} dangling reference(s)", stats.dangling.total());
    }
    info!(
        "Built graph: {} salons, {} cities, {} states, {} categories",
        salons.len(),
        cities.len(),
        states.len(),
        categories.len()
    );

    let graph = Graph {
        salons,
        cities,
        states,
        categories,
        amenities,
        payments,
        unknown,
    };
    (graph, stats)
}

/// Pick the slug for one entity and claim it in the kind's registry.
///
/// Preference: the given slug (re-cleaned), then the display name, then the
/// id, then the kind name.
fn assign_slug(
    registry: &mut SlugRegistry,
    stats: &mut BuildStats,
    kind: EntityKind,
    id: &str,
    given: Option<&str>,
    name: &str,
) -> String {
    let mut base = String::new();
    if let Some(raw) = given {
        base = slugify(raw);
        if base != raw {
            debug!("Cleaned {kind} {id} slug {raw:?} -> {base:?}");
        }
    }
    if base.is_empty() {
        base = slugify(name);
    }
    if base.is_empty() {
        base = slugify(id);
        if base.is_empty() {
            base = kind.to_string();
        }
        warn!("{kind} {id} has no usable slug, using {base:?}");
    }

    let slug = registry.claim(&base);
    if slug != base {
        debug!("{kind} {id} slug {base:?} taken, using {slug:?}");
        stats.slug_collisions += 1;
    }
    slug
}

/// Find or create the Unknown state and the Unknown city inside it.
fn unknown_pair(
    states: &mut Vec<State>,
    cities: &mut Vec<City>,
    state_slugs: &mut SlugRegistry,
    city_slugs: &mut SlugRegistry,
) -> Placement {
    let state = match states.iter().position(|s| s.name == UNKNOWN_NAME) {
        Some(i) => StateIdx(i),
        None => {
            let idx = StateIdx(states.len());
            let id = unused_id(|id| states.iter().any(|s| s.id == id));
            states.push(State {
                id,
                name: UNKNOWN_NAME.to_string(),
                slug: state_slugs.claim(UNKNOWN_ID),
                cities: Vec::new(),
                salons: Vec::new(),
                salon_count: 0,
            });
            idx
        }
    };

    let existing_city = cities
        .iter()
        .position(|c| c.name == UNKNOWN_NAME && c.state == Some(state));
    let city = match existing_city {
        Some(i) => CityIdx(i),
        None => {
            let idx = CityIdx(cities.len());
            let id = unused_id(|id| cities.iter().any(|c| c.id == id));
            cities.push(City {
                id,
                name: UNKNOWN_NAME.to_string(),
                slug: city_slugs.claim(UNKNOWN_ID),
                state_id: states[state.0].id.clone(),
                state: Some(state),
                salons: Vec::new(),
                salon_count: 0,
            });
            states[state.0].cities.push(idx);
            idx
        }
    };

    Placement { city, state }
}

/// `unknown`, or the first `unknown-N` (N from 2) that no row of the kind uses.
fn unused_id(taken: impl Fn(&str) -> bool) -> String {
    if !taken(UNKNOWN_ID) {
        return UNKNOWN_ID.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{UNKNOWN_ID}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Parse a star rating cell (`"4"`, `"4.6"`) into whole stars, 0 to 5.
fn parse_stars(raw: &str) -> Option<u8> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 5.0) as u8)
}
