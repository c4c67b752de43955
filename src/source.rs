//! Tabular data source: typed CSV rows from an archive or a directory.
//!
//! Stage 1 of the build. The directory data ships as one CSV file per table,
//! usually bundled in a zip archive:
//!
//! ```text
//! data.zip
//! ├── beauty_salon.csv             # id, title, slug?, address?, telephone?, ...
//! ├── state.csv                    # id, state, slug?
//! ├── city.csv                     # id, city, slug?, state_id
//! ├── category.csv                 # id, category, slug?
//! ├── amenity.csv                  # id, amenity
//! ├── payment.csv                  # id, payment
//! ├── beauty_salon_detail.csv      # beauty_salon_id, key, value
//! ├── image.csv                    # beauty_salon_id, path
//! ├── review.csv                   # beauty_salon_id, review, author?, time?, rating_stars?
//! ├── city_x_beauty_salon.csv      # beauty_salon_id, city_id
//! ├── beauty_salon_x_category.csv  # beauty_salon_id, category_id
//! ├── amenity_x_beauty_salon.csv   # beauty_salon_id, amenity_id
//! └── payment_x_beauty_salon.csv   # beauty_salon_id, payment_id
//! ```
//!
//! Columns are matched by header name, so extra columns are ignored and
//! column order does not matter. Empty cells become `None` for optional
//! fields. Archives are read in memory; nothing is extracted to disk.
//!
//! ## Loading
//!
//! [`load_tables`] reads every table concurrently (one rayon task per table)
//! and only returns once all of them finished. Any table that is missing or
//! fails to parse makes the whole load fail: there are no partial builds.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Data source not found: {0}")]
    NotFound(PathBuf),
    #[error("Cannot read archive {0}: {1}")]
    Archive(PathBuf, #[source] zip::result::ZipError),
    #[error("Table '{table}' not found in {source_name}")]
    MissingTable { table: String, source_name: String },
    #[error("Table '{table}' is malformed: {error}")]
    Csv {
        table: String,
        #[source]
        error: csv::Error,
    },
}

/// Table (file stem) names.
pub mod tables {
    pub const SALON: &str = "beauty_salon";
    pub const STATE: &str = "state";
    pub const CITY: &str = "city";
    pub const CATEGORY: &str = "category";
    pub const AMENITY: &str = "amenity";
    pub const PAYMENT: &str = "payment";
    pub const DETAIL: &str = "beauty_salon_detail";
    pub const IMAGE: &str = "image";
    pub const REVIEW: &str = "review";
    pub const CITY_SALON: &str = "city_x_beauty_salon";
    pub const SALON_CATEGORY: &str = "beauty_salon_x_category";
    pub const AMENITY_SALON: &str = "amenity_x_beauty_salon";
    pub const PAYMENT_SALON: &str = "payment_x_beauty_salon";

    pub const ALL: [&str; 13] = [
        SALON,
        STATE,
        CITY,
        CATEGORY,
        AMENITY,
        PAYMENT,
        DETAIL,
        IMAGE,
        REVIEW,
        CITY_SALON,
        SALON_CATEGORY,
        AMENITY_SALON,
        PAYMENT_SALON,
    ];
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalonRow {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub service_product: Option<String>,
    #[serde(default)]
    pub average_star: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateRow {
    pub id: String,
    #[serde(rename = "state", default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityRow {
    pub id: String,
    #[serde(rename = "city", default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub state_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    #[serde(rename = "category", default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmenityRow {
    pub id: String,
    #[serde(rename = "amenity", default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRow {
    pub id: String,
    #[serde(rename = "payment", default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailRow {
    pub beauty_salon_id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageRow {
    pub beauty_salon_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRow {
    pub beauty_salon_id: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub rating_stars: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CitySalonRow {
    pub beauty_salon_id: String,
    pub city_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalonCategoryRow {
    pub beauty_salon_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmenitySalonRow {
    pub beauty_salon_id: String,
    pub amenity_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentSalonRow {
    pub beauty_salon_id: String,
    pub payment_id: String,
}

/// Every table the graph builder consumes, as loaded rows.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub salons: Vec<SalonRow>,
    pub states: Vec<StateRow>,
    pub cities: Vec<CityRow>,
    pub categories: Vec<CategoryRow>,
    pub amenities: Vec<AmenityRow>,
    pub payments: Vec<PaymentRow>,
    pub details: Vec<DetailRow>,
    pub images: Vec<ImageRow>,
    pub reviews: Vec<ReviewRow>,
    pub city_salons: Vec<CitySalonRow>,
    pub salon_categories: Vec<SalonCategoryRow>,
    pub amenity_salons: Vec<AmenitySalonRow>,
    pub payment_salons: Vec<PaymentSalonRow>,
}

impl RawTables {
    /// Row count per table, in [`tables::ALL`] order.
    pub fn row_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            (tables::SALON, self.salons.len()),
            (tables::STATE, self.states.len()),
            (tables::CITY, self.cities.len()),
            (tables::CATEGORY, self.categories.len()),
            (tables::AMENITY, self.amenities.len()),
            (tables::PAYMENT, self.payments.len()),
            (tables::DETAIL, self.details.len()),
            (tables::IMAGE, self.images.len()),
            (tables::REVIEW, self.reviews.len()),
            (tables::CITY_SALON, self.city_salons.len()),
            (tables::SALON_CATEGORY, self.salon_categories.len()),
            (tables::AMENITY_SALON, self.amenity_salons.len()),
            (tables::PAYMENT_SALON, self.payment_salons.len()),
        ]
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Something that can hand out the raw CSV bytes of a named table.
///
/// `Sync` so that [`load_tables`] can read tables from several rayon workers.
pub trait TableSource: Sync {
    /// Human-readable location, for messages.
    fn describe(&self) -> String;

    /// Open the table with the given name (file stem, no `.csv`).
    fn open_table(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError>;
}

/// A directory containing `<table>.csv` files, possibly in subdirectories.
///
/// When the same table name appears more than once, the first path in
/// sorted walk order wins.
#[derive(Debug)]
pub struct DirSource {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
}

impl DirSource {
    pub fn open(root: &Path) -> Result<Self, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::NotFound(root.to_path_buf()));
        }
        let mut files = HashMap::new();
        for entry in WalkDir::new(root).max_depth(3).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(stem) = csv_stem(path) {
                files.entry(stem).or_insert_with(|| path.to_path_buf());
            }
        }
        debug!("Found {} CSV files under {}", files.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }
}

impl TableSource for DirSource {
    fn describe(&self) -> String {
        format!("{}/", self.root.display())
    }

    fn open_table(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        let path = self
            .files
            .get(name)
            .ok_or_else(|| SourceError::MissingTable {
                table: name.to_string(),
                source_name: self.describe(),
            })?;
        Ok(Box::new(File::open(path)?))
    }
}

/// A zip archive of CSV files, read fully into memory on open.
#[derive(Debug)]
pub struct ZipSource {
    path: PathBuf,
    files: HashMap<String, Vec<u8>>,
}

impl ZipSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| SourceError::Archive(path.to_path_buf(), e))?;

        let mut files = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| SourceError::Archive(path.to_path_buf(), e))?;
            if entry.is_dir() {
                continue;
            }
            let entry_path = PathBuf::from(entry.name());
            // Skip resource-fork junk that macOS adds to archives
            if entry_path
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with("__MACOSX"))
            {
                continue;
            }
            let Some(stem) = csv_stem(&entry_path) else {
                continue;
            };
            if files.contains_key(&stem) {
                continue;
            }
            let mut bytes = Vec::with_capacity(prealloc_len(entry.size()));
            entry.read_to_end(&mut bytes)?;
            files.insert(stem, bytes);
        }
        debug!("Read {} CSV entries from {}", files.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            files,
        })
    }
}

impl TableSource for ZipSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn open_table(&self, name: &str) -> Result<Box<dyn Read + '_>, SourceError> {
        let bytes = self
            .files
            .get(name)
            .ok_or_else(|| SourceError::MissingTable {
                table: name.to_string(),
                source_name: self.describe(),
            })?;
        Ok(Box::new(Cursor::new(bytes.as_slice())))
    }
}

/// Open a data source: directories are read as-is, files as zip archives.
pub fn open_source(path: &Path) -> Result<Box<dyn TableSource>, SourceError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
        _ => SourceError::Io(e),
    })?;
    if metadata.is_dir() {
        Ok(Box::new(DirSource::open(path)?))
    } else {
        Ok(Box::new(ZipSource::open(path)?))
    }
}

/// Upper bound on the buffer reserved up front for one archive entry. The
/// declared size comes from the archive itself and is not trusted beyond this.
const PREALLOC_LIMIT: u64 = 1 << 20;

fn prealloc_len(declared: u64) -> usize {
    declared.min(PREALLOC_LIMIT) as usize
}

fn csv_stem(path: &Path) -> Option<String> {
    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return None;
    }
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

// ============================================================================
// Loading
// ============================================================================

/// Load all rows of one table.
pub fn load_table<T: DeserializeOwned>(
    source: &dyn TableSource,
    name: &str,
) -> Result<Vec<T>, SourceError> {
    let reader = source.open_table(name)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|error| SourceError::Csv {
            table: name.to_string(),
            error,
        })?;
    debug!("Loaded {} rows from {}", rows.len(), name);
    Ok(rows)
}

fn finish<T>(slot: Option<Result<Vec<T>, SourceError>>) -> Result<Vec<T>, SourceError> {
    // Every slot is filled before rayon::scope returns; an empty slot can
    // only mean the task panicked, and that panic has already propagated.
    slot.unwrap_or_else(|| Ok(Vec::new()))
}

/// Load every table concurrently and join the results.
///
/// Fails with the first error in [`tables::ALL`] order if any table could
/// not be loaded.
pub fn load_tables(source: &dyn TableSource) -> Result<RawTables, SourceError> {
    info!("Loading tables from {}", source.describe());

    let mut salons = None;
    let mut states = None;
    let mut cities = None;
    let mut categories = None;
    let mut amenities = None;
    let mut payments = None;
    let mut details = None;
    let mut images = None;
    let mut reviews = None;
    let mut city_salons = None;
    let mut salon_categories = None;
    let mut amenity_salons = None;
    let mut payment_salons = None;

    rayon::scope(|s| {
        s.spawn(|_| salons = Some(load_table(source, tables::SALON)));
        s.spawn(|_| states = Some(load_table(source, tables::STATE)));
        s.spawn(|_| cities = Some(load_table(source, tables::CITY)));
        s.spawn(|_| categories = Some(load_table(source, tables::CATEGORY)));
        s.spawn(|_| amenities = Some(load_table(source, tables::AMENITY)));
        s.spawn(|_| payments = Some(load_table(source, tables::PAYMENT)));
        s.spawn(|_| details = Some(load_table(source, tables::DETAIL)));
        s.spawn(|_| images = Some(load_table(source, tables::IMAGE)));
        s.spawn(|_| reviews = Some(load_table(source, tables::REVIEW)));
        s.spawn(|_| city_salons = Some(load_table(source, tables::CITY_SALON)));
        s.spawn(|_| salon_categories = Some(load_table(source, tables::SALON_CATEGORY)));
        s.spawn(|_| amenity_salons = Some(load_table(source, tables::AMENITY_SALON)));
        s.spawn(|_| payment_salons = Some(load_table(source, tables::PAYMENT_SALON)));
    });

    let tables = RawTables {
        salons: finish(salons)?,
        states: finish(states)?,
        cities: finish(cities)?,
        categories: finish(categories)?,
        amenities: finish(amenities)?,
        payments: finish(payments)?,
        details: finish(details)?,
        images: finish(images)?,
        reviews: finish(reviews)?,
        city_salons: finish(city_salons)?,
        salon_categories: finish(salon_categories)?,
        amenity_salons: finish(amenity_salons)?,
        payment_salons: finish(payment_salons)?,
    };
    info!("Loaded {} salons", tables.salons.len());
    Ok(tables)
}
