//! HTML page rendering.
//!
//! Pure functions from `&Graph` (plus site settings) to [`Markup`]. Nothing
//! here touches the filesystem; [`site`](crate::site) decides which pages
//! exist and where they are written.
//!
//! ## Pages
//!
//! | Renderer | URL |
//! |----------|-----|
//! | [`render_salon_page`] | `/salon/{slug}/` |
//! | [`render_city_page`] | `/cities/{slug}/` |
//! | [`render_state_page`] | `/states/{slug}/` |
//! | [`render_category_page`] | `/categories/{slug}/` |
//! | [`render_states_index`] | `/states/` |
//! | [`render_cities_index`] | `/cities/` |
//! | [`render_categories_index`] | `/categories/` |
//! | [`render_search_index`] | `/search-index.html` |
//! | [`render_html_sitemap`] | `/sitemap.html` |
//!
//! Every page shares one base document, the site header and the footer, and
//! links the generated stylesheet at `/assets/css/styles.css`. Links only
//! ever point at publishable entities.
//!
//! Uses [maud](https://maud.lambda.xyz/): interpolated data is escaped, so
//! salon names and descriptions from the CSV tables are safe to embed.

use crate::config::SiteSection;
use crate::graph::{Category, City, Graph, Salon, State};
use crate::site::{Publishable, index_url};
use crate::types::EntityKind;
use maud::{DOCTYPE, Markup, html};

/// Stylesheet path linked from every page.
pub const STYLESHEET_URL: &str = "/assets/css/styles.css";

const FEATURED_COUNT: usize = 6;
const NEARBY_COUNT: usize = 3;
const META_DESCRIPTION_CHARS: usize = 150;

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(site: &SiteSection, title: &str, description: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="description" content=(description);
                title { (title) }
                link rel="stylesheet" href=(STYLESHEET_URL);
            }
            body {
                (site_header(site))
                (content)
                (site_footer(site))
            }
        }
    }
}

/// Renders the site header with the static page links
fn site_header(site: &SiteSection) -> Markup {
    html! {
        header.site-header {
            a.site-name href="/" { (site.name) }
            nav.site-nav {
                a href="/" { "Home" }
                a href=(index_url(EntityKind::State)) { "States" }
                a href=(index_url(EntityKind::City)) { "Cities" }
                @for page in &site.static_pages {
                    a href={ "/" (page) "/" } { (page_label(page)) }
                }
            }
        }
    }
}

fn site_footer(site: &SiteSection) -> Markup {
    html! {
        footer.site-footer {
            p { "Find the best nail salons, nail spas, and nail technicians in your area." }
            nav {
                a href="/sitemap.html" { "Sitemap" }
            }
            p.copyright { "© " (site.name) }
        }
    }
}

/// Breadcrumb trail; the last item is the current page and is not a link.
fn breadcrumbs(items: &[(&str, Option<String>)]) -> Markup {
    html! {
        nav.breadcrumb {
            ol {
                @for (i, (label, url)) in items.iter().enumerate() {
                    @if i > 0 {
                        li.separator { "/" }
                    }
                    @match url {
                        Some(url) => li { a href=(url) { (label) } },
                        None => li.current { (label) },
                    }
                }
            }
        }
    }
}

fn salon_card(graph: &Graph, site: &SiteSection, salon: &Salon) -> Markup {
    let city = graph.salon_city(salon);
    let state = graph.salon_state(salon);
    html! {
        article.salon-card {
            a href=(salon.url()) {
                @match salon.hero_image() {
                    Some(image) => {
                        img src=(image_url(&site.image_base_url, &image.path)) alt=(salon.title) loading="lazy";
                    },
                    None => div.image-placeholder {},
                }
                h3 { (salon.title) }
            }
            p.location { (city.name) ", " (state.name) }
            @if let Some(stars) = &salon.average_star {
                p.rating { "★ " (stars) }
            }
            @if let Some(address) = &salon.address {
                p.address { (address) }
            }
        }
    }
}

fn listings_grid(graph: &Graph, site: &SiteSection, salons: &[&Salon]) -> Markup {
    html! {
        div.listings-grid {
            @for salon in salons {
                (salon_card(graph, site, salon))
            }
        }
    }
}

fn no_listings(what: &str) -> Markup {
    html! {
        section.no-listings {
            h2 { "No Listings Found" }
            p { "We couldn't find any " (what) " listings at this time." }
            a.button href="/add-a-listing/" { "Add a Listing" }
        }
    }
}

// ============================================================================
// Entity pages
// ============================================================================

/// Renders a salon detail page
pub fn render_salon_page(graph: &Graph, site: &SiteSection, salon: &Salon) -> Markup {
    let city = graph.salon_city(salon);
    let state = graph.salon_state(salon);

    let summary = salon
        .description
        .as_deref()
        .map(|d| truncate_chars(d, META_DESCRIPTION_CHARS))
        .unwrap_or_else(|| {
            "Visit us for quality manicures, pedicures, gel nails, acrylics, and nail art services."
                .to_string()
        });
    let meta = format!(
        "{} is a nail salon in {}, {}. {}",
        salon.title, city.name, state.name, summary
    );

    let nearby: Vec<&Salon> = city
        .salons
        .iter()
        .map(|&s| graph.salon(s))
        .filter(|s| s.id != salon.id)
        .take(NEARBY_COUNT)
        .collect();

    let content = html! {
        (breadcrumbs(&[
            ("Home", Some("/".to_string())),
            (state.name.as_str(), link_if(state.is_publishable(), || state.url())),
            (city.name.as_str(), link_if(city.is_publishable(), || city.url())),
            (salon.title.as_str(), None),
        ]))
        main.salon-page {
            header.salon-header {
                h1 { (salon.title) }
                p.location { (city.name) ", " (state.name) }
                @if let Some(stars) = &salon.average_star {
                    p.rating { "★ " (stars) }
                }
            }
            @if let Some(hero) = salon.hero_image() {
                img.hero src=(image_url(&site.image_base_url, &hero.path)) alt=(salon.title);
            }
            div.salon-body {
                div.salon-main {
                    section.about {
                        h2 { "About " (salon.title) }
                        @match &salon.description {
                            Some(d) => p { (d) },
                            None => p {
                                (salon.title) " offers a wide range of nail services in "
                                (city.name) ", " (state.name) "."
                            },
                        }
                    }
                    @if let Some(services) = &salon.service_product {
                        section.services {
                            h2 { "Services" }
                            p { (services) }
                        }
                    }
                    @if !salon.categories.is_empty() {
                        section.categories {
                            h2 { "Categories" }
                            ul {
                                @for &c in &salon.categories {
                                    @let category = graph.category(c);
                                    li { a href=(category.url()) { (category.name) } }
                                }
                            }
                        }
                    }
                    @if !salon.amenities.is_empty() {
                        section.amenities {
                            h2 { "Amenities" }
                            ul {
                                @for &a in &salon.amenities {
                                    li { (graph.amenity(a).name) }
                                }
                            }
                        }
                    }
                    @if !salon.details.is_empty() {
                        section.details {
                            h2 { "Details" }
                            ul {
                                @for detail in &salon.details {
                                    li { strong { (detail.key) ":" } " " (detail.value) }
                                }
                            }
                        }
                    }
                    @if !salon.reviews.is_empty() {
                        section.reviews {
                            h2 { "Reviews" }
                            @for review in &salon.reviews {
                                blockquote.review {
                                    @if let Some(stars) = review.rating_stars {
                                        p.stars { (star_string(stars)) }
                                    }
                                    p { (review.text) }
                                    @if review.author.is_some() || review.time.is_some() {
                                        footer {
                                            @if let Some(author) = &review.author { (author) }
                                            @if let Some(time) = &review.time { " · " (time) }
                                        }
                                    }
                                }
                            }
                        }
                    }
                    @if salon.images.len() > 1 {
                        section.gallery {
                            h2 { "Gallery" }
                            div.gallery-grid {
                                @for image in &salon.images[1..] {
                                    img src=(image_url(&site.image_base_url, &image.path)) alt=(salon.title) loading="lazy";
                                }
                            }
                        }
                    }
                }
                aside.contact-card {
                    h2 { "Contact" }
                    @if let Some(address) = &salon.address {
                        p.address {
                            (address)
                            @if let Some(zip) = &salon.postal_code { " " (zip) }
                        }
                    }
                    @if let Some(phone) = &salon.telephone {
                        p { a href={ "tel:" (phone) } { (phone) } }
                    }
                    @if let Some(email) = &salon.email {
                        p { a href={ "mailto:" (email) } { (email) } }
                    }
                    @if let Some(website) = salon.website.as_deref().and_then(website_url) {
                        p { a href=(website) rel="nofollow noopener" target="_blank" { "Visit Website" } }
                    }
                    @if let Some(hours) = &salon.opening_hours {
                        h3 { "Hours" }
                        table.hours {
                            tbody {
                                @for (days, time) in opening_hours_rows(hours) {
                                    tr {
                                        @match time {
                                            Some(time) => { td { (days) } td { (time) } },
                                            None => td colspan="2" { (days) },
                                        }
                                    }
                                }
                            }
                        }
                    }
                    @if !salon.payments.is_empty() {
                        h3 { "Payment Methods" }
                        ul.payments {
                            @for &p in &salon.payments {
                                li { (graph.payment(p).name) }
                            }
                        }
                    }
                    @if let Some((lat, lon)) = salon.coordinates() {
                        iframe.map src=(osm_embed_url(lat, lon)) title={ "Map of " (salon.title) } loading="lazy" {}
                    }
                }
            }
            @if !nearby.is_empty() {
                section.nearby {
                    h2 { "More Nail Salons in " (city.name) }
                    (listings_grid(graph, site, &nearby))
                }
            }
        }
    };

    let title = format!("{} - Nail Salon in {}, {}", salon.title, city.name, state.name);
    base_document(site, &title, &meta, content)
}

/// Renders a city page listing every salon in the city
pub fn render_city_page(graph: &Graph, site: &SiteSection, city: &City) -> Markup {
    let state = graph.city_state(city);
    let state_name = state.map(|s| s.name.as_str()).unwrap_or("Unknown State");
    let salons: Vec<&Salon> = city.salons.iter().map(|&s| graph.salon(s)).collect();

    let mut trail: Vec<(&str, Option<String>)> = vec![("Home", Some("/".to_string()))];
    if let Some(state) = state {
        trail.push((state.name.as_str(), link_if(state.is_publishable(), || state.url())));
    }
    trail.push((city.name.as_str(), None));

    let content = html! {
        (breadcrumbs(&trail))
        main.city-page {
            header.page-header {
                h1 { "Nail Salons in " (city.name) ", " (state_name) }
                p.count { (listing_count(city.salon_count)) " found" }
            }
            @if salons.is_empty() {
                (no_listings(&city.name))
            } @else {
                (listings_grid(graph, site, &salons))
            }
            section.about {
                h2 { "About Nail Salons in " (city.name) }
                p {
                    "Browse our listings to find nail salons in " (city.name)
                    ". Visit them directly to explore their service menu."
                }
            }
        }
    };

    let title = format!("Nail Salons in {}, {} - Directory", city.name, state_name);
    let meta = format!(
        "Find nail salons in {}, {}. Browse our listings of top-rated nail spas and nail technicians.",
        city.name, state_name
    );
    base_document(site, &title, &meta, content)
}

/// Renders a state page: its cities (alphabetical) and featured salons
pub fn render_state_page(graph: &Graph, site: &SiteSection, state: &State) -> Markup {
    let mut cities: Vec<&City> = state
        .cities
        .iter()
        .map(|&c| graph.city(c))
        .filter(|c| c.is_publishable())
        .collect();
    sort_by_name(&mut cities, |c| c.name.as_str());
    let featured: Vec<&Salon> = state
        .salons
        .iter()
        .take(FEATURED_COUNT)
        .map(|&s| graph.salon(s))
        .collect();

    let content = html! {
        (breadcrumbs(&[("Home", Some("/".to_string())), (state.name.as_str(), None)]))
        main.state-page {
            header.page-header {
                h1 { "Nail Salons in " (state.name) }
                p { "Find professional nail salons across " (state.name) ". Browse by city or view all listings." }
                p.count {
                    (listing_count(state.salon_count)) " across " (cities.len())
                    @if cities.len() == 1 { " city" } @else { " cities" }
                }
            }
            section.cities {
                h2 { "Cities in " (state.name) }
                ul.link-grid {
                    @for city in &cities {
                        li {
                            a href=(city.url()) { (city.name) }
                            span.count { (listing_count(city.salon_count)) }
                        }
                    }
                }
            }
            @if !featured.is_empty() {
                section.featured {
                    h2 { "Featured Nail Salons in " (state.name) }
                    (listings_grid(graph, site, &featured))
                }
            }
        }
    };

    let title = format!("Nail Salons in {} - Directory by City", state.name);
    let meta = format!(
        "Find nail salons in {}. Browse our directory of nail spas and nail technicians by city.",
        state.name
    );
    base_document(site, &title, &meta, content)
}

/// Renders a category page listing every salon in the category
pub fn render_category_page(graph: &Graph, site: &SiteSection, category: &Category) -> Markup {
    let salons: Vec<&Salon> = category.salons.iter().map(|&s| graph.salon(s)).collect();
    let lower = category.name.to_lowercase();

    let content = html! {
        (breadcrumbs(&[
            ("Home", Some("/".to_string())),
            ("Categories", Some(index_url(EntityKind::Category))),
            (category.name.as_str(), None),
        ]))
        main.category-page {
            header.page-header {
                h1 { (category.name) }
                p.count { (listing_count(category.salon_count)) " found" }
            }
            @if salons.is_empty() {
                (no_listings(&lower))
            } @else {
                (listings_grid(graph, site, &salons))
            }
            section.about {
                h2 { "About " (category.name) }
                p { "Browse our listings to find quality " (lower) " in your area." }
            }
        }
    };

    let title = format!("{} - Nail Salon Directory", category.name);
    let meta = format!(
        "Find {lower} specializing in nail services and treatments. Browse our directory of professional nail salons."
    );
    base_document(site, &title, &meta, content)
}

// ============================================================================
// Index pages
// ============================================================================

/// Renders `/states/`: every publishable state, alphabetical
pub fn render_states_index(graph: &Graph, site: &SiteSection) -> Markup {
    let states = publishable_states(graph);
    let total: usize = states.iter().map(|s| s.salon_count).sum();

    let content = html! {
        (breadcrumbs(&[("Home", Some("/".to_string())), ("States", None)]))
        main.index-page {
            header.page-header {
                h1 { "Browse Nail Salons by State" }
                p.count { (listing_count(total)) " across " (states.len()) " states" }
            }
            ul.link-grid {
                @for state in &states {
                    li {
                        a href=(state.url()) { (state.name) }
                        span.count { (listing_count(state.salon_count)) }
                    }
                }
            }
        }
    };

    base_document(
        site,
        "Browse Nail Salons by State - National Directory",
        "Browse nail salons by state. Find nail spas with manicures, pedicures, and specialty nail services.",
        content,
    )
}

/// Renders `/cities/`: publishable cities grouped by state, both alphabetical
pub fn render_cities_index(graph: &Graph, site: &SiteSection) -> Markup {
    let states = publishable_states(graph);
    let groups: Vec<(&State, Vec<&City>)> = states
        .into_iter()
        .map(|state| {
            let mut cities: Vec<&City> = state
                .cities
                .iter()
                .map(|&c| graph.city(c))
                .filter(|c| c.is_publishable())
                .collect();
            sort_by_name(&mut cities, |c| c.name.as_str());
            (state, cities)
        })
        .filter(|(_, cities)| !cities.is_empty())
        .collect();
    let city_total: usize = groups.iter().map(|(_, c)| c.len()).sum();
    let listing_total: usize = groups
        .iter()
        .flat_map(|(_, c)| c.iter())
        .map(|c| c.salon_count)
        .sum();

    let content = html! {
        (breadcrumbs(&[("Home", Some("/".to_string())), ("Cities", None)]))
        main.index-page {
            header.page-header {
                h1 { "Browse Nail Salons by City" }
                p.count { (listing_count(listing_total)) " across " (city_total) " cities" }
            }
            @for (state, cities) in &groups {
                section.state-group {
                    h2 { a href=(state.url()) { (state.name) } }
                    ul.link-grid {
                        @for city in cities {
                            li {
                                a href=(city.url()) { (city.name) }
                                span.count { (listing_count(city.salon_count)) }
                            }
                        }
                    }
                }
            }
        }
    };

    base_document(
        site,
        "Browse Nail Salons by City - National Directory",
        "Browse nail salons by city. Find nail spas with manicures, pedicures, and specialty nail services.",
        content,
    )
}

/// Renders `/categories/`: every publishable category, alphabetical
pub fn render_categories_index(graph: &Graph, site: &SiteSection) -> Markup {
    let categories = publishable_categories(graph);

    let content = html! {
        (breadcrumbs(&[("Home", Some("/".to_string())), ("Categories", None)]))
        main.index-page {
            header.page-header {
                h1 { "Browse Nail Salons by Category" }
            }
            ul.link-grid {
                @for category in &categories {
                    li {
                        a href=(category.url()) { (category.name) }
                        span.count { (listing_count(category.salon_count)) }
                    }
                }
            }
        }
    };

    base_document(
        site,
        "Browse Nail Salons by Category - National Directory",
        "Browse nail salons by service category.",
        content,
    )
}

/// Renders `search-index.html`, a static landing page for crawlers
pub fn render_search_index(graph: &Graph, site: &SiteSection) -> Markup {
    let states = publishable_states(graph);
    let categories = publishable_categories(graph);
    let featured: Vec<&Salon> = graph.salons().iter().take(FEATURED_COUNT).collect();

    let content = html! {
        main.search-index {
            section.hero {
                h1 { "Find Nail Salons Near You" }
                p { "Discover top-rated nail salons, nail spas, and nail technicians in your area." }
            }
            @if !featured.is_empty() {
                section.featured {
                    h2 { "Featured Nail Salons" }
                    (listings_grid(graph, site, &featured))
                }
            }
            section.states {
                h2 { "Browse by State" }
                ul.link-grid {
                    @for state in &states {
                        li {
                            a href=(state.url()) { (state.name) }
                            span.count { (listing_count(state.salons.len())) }
                        }
                    }
                }
            }
            section.categories {
                h2 { "Browse by Category" }
                ul.link-grid {
                    @for category in &categories {
                        li {
                            a href=(category.url()) { (category.name) }
                            span.count { (listing_count(category.salons.len())) }
                        }
                    }
                }
            }
        }
    };

    base_document(
        site,
        "Nail Salons Near You - Find Local Nail Salons",
        "Find professional nail salons near you. Our directory features quality nail spas and nail technicians across the United States.",
        content,
    )
}

/// Renders `sitemap.html`: every publishable page, grouped and alphabetical
pub fn render_html_sitemap(graph: &Graph, site: &SiteSection) -> Markup {
    let states = publishable_states(graph);
    let categories = publishable_categories(graph);

    let mut cities: Vec<&City> = graph
        .cities()
        .iter()
        .filter(|c| c.is_publishable())
        .collect();
    sort_by_name(&mut cities, |c| c.name.as_str());

    let mut salons: Vec<&Salon> = graph.salons().iter().collect();
    sort_by_name(&mut salons, |s| s.title.as_str());

    let content = html! {
        main.html-sitemap {
            h1 { "Sitemap" }
            section {
                h2 { "Main Pages" }
                ul {
                    li { a href="/" { "Home" } }
                    @for page in &site.static_pages {
                        li { a href={ "/" (page) "/" } { (page_label(page)) } }
                    }
                    li { a href=(index_url(EntityKind::State)) { "All States" } }
                    li { a href=(index_url(EntityKind::City)) { "All Cities" } }
                    li { a href=(index_url(EntityKind::Category)) { "All Categories" } }
                }
            }
            section {
                h2 { "States" }
                ul {
                    @for state in &states {
                        li { a href=(state.url()) { (state.name) } }
                    }
                }
            }
            section {
                h2 { "Categories" }
                ul {
                    @for category in &categories {
                        li { a href=(category.url()) { (category.name) } }
                    }
                }
            }
            section {
                h2 { "Cities" }
                ul {
                    @for city in &cities {
                        li {
                            a href=(city.url()) {
                                (city.name)
                                @if let Some(state) = graph.city_state(city) { ", " (state.name) }
                            }
                        }
                    }
                }
            }
            section {
                h2 { "Salons" }
                ul {
                    @for salon in &salons {
                        li { a href=(salon.url()) { (salon.title) } }
                    }
                }
            }
        }
    };

    base_document(
        site,
        &format!("Sitemap - {}", site.name),
        "Every state, city, category and salon in the directory.",
        content,
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn publishable_states(graph: &Graph) -> Vec<&State> {
    let mut states: Vec<&State> = graph
        .states()
        .iter()
        .filter(|s| s.is_publishable())
        .collect();
    sort_by_name(&mut states, |s| s.name.as_str());
    states
}

fn publishable_categories(graph: &Graph) -> Vec<&Category> {
    let mut categories: Vec<&Category> = graph
        .categories()
        .iter()
        .filter(|c| c.is_publishable())
        .collect();
    sort_by_name(&mut categories, |c| c.name.as_str());
    categories
}

/// Case-insensitive alphabetical sort; exact name breaks ties.
pub fn sort_by_name<T>(items: &mut [&T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    });
}

fn link_if(publishable: bool, url: impl FnOnce() -> String) -> Option<String> {
    publishable.then(url)
}

/// `"1 listing"`, `"3 listings"`.
pub fn listing_count(n: usize) -> String {
    if n == 1 {
        "1 listing".to_string()
    } else {
        format!("{n} listings")
    }
}

/// `"add-a-listing"` → `"Add A Listing"`.
fn page_label(page: &str) -> String {
    page.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The website cell as a link target, when it is an `http` or `https` URL.
pub fn website_url(raw: &str) -> Option<&str> {
    let url = raw.trim();
    let (scheme, _) = url.split_once(':')?;
    (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")).then_some(url)
}

/// Prefix an image path with the configured base URL. Absolute URLs pass
/// through unchanged.
pub fn image_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn star_string(stars: u8) -> String {
    "★".repeat(stars as usize)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn osm_embed_url(lat: f64, lon: f64) -> String {
    const PAD: f64 = 0.01;
    format!(
        "https://www.openstreetmap.org/export/embed.html?bbox={},{},{},{}&layer=mapnik&marker={},{}",
        lon - PAD,
        lat - PAD,
        lon + PAD,
        lat + PAD,
        lat,
        lon
    )
}

/// Split free-form opening hours into `(days, hours)` rows.
///
/// Segments are separated by commas or newlines. `"Mon-Fri: 9am-5pm"` splits
/// at the colon, `"Sa 10:00-16:00"` at the first space. A segment with no
/// separator becomes a single cell.
pub fn opening_hours_rows(text: &str) -> Vec<(String, Option<String>)> {
    text.split([',', '\n'])
        .map(|s| s.replace('"', ""))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some((days, hours)) = segment.split_once(':') {
                let hours = hours.trim();
                if !days.chars().any(|c| c.is_ascii_digit()) && !hours.is_empty() {
                    return (days.trim().to_string(), Some(hours.to_string()));
                }
            }
            match segment.split_once(char::is_whitespace) {
                Some((days, hours)) if !hours.trim().is_empty() => {
                    (days.to_string(), Some(hours.trim().to_string()))
                }
                _ => (segment, None),
            }
        })
        .collect()
}
