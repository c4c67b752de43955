//! Shared handle and kind types used across the pipeline stages.
//!
//! The entity graph is an arena: every entity lives in one `Vec` owned by
//! [`Graph`](crate::graph::Graph), and relations between entities are stored
//! as the index handles below rather than as references. A handle is only
//! meaningful for the graph that produced it.

use serde::Serialize;
use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) usize);
    };
}

handle!(
    /// Handle to a [`Salon`](crate::graph::Salon).
    SalonIdx
);
handle!(
    /// Handle to a [`City`](crate::graph::City).
    CityIdx
);
handle!(
    /// Handle to a [`State`](crate::graph::State).
    StateIdx
);
handle!(
    /// Handle to a [`Category`](crate::graph::Category).
    CategoryIdx
);
handle!(AmenityIdx);
handle!(PaymentIdx);

/// The kinds of entity that get their own page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Salon,
    City,
    State,
    Category,
}

impl EntityKind {
    /// First URL segment for pages of this kind (`/cities/austin/`).
    pub fn url_segment(self) -> &'static str {
        match self {
            EntityKind::Salon => "salon",
            EntityKind::City => "cities",
            EntityKind::State => "states",
            EntityKind::Category => "categories",
        }
    }

    /// Plural display label used in summaries and the HTML sitemap.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Salon => "salons",
            EntityKind::City => "cities",
            EntityKind::State => "states",
            EntityKind::Category => "categories",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Salon => "salon",
            EntityKind::City => "city",
            EntityKind::State => "state",
            EntityKind::Category => "category",
        };
        f.write_str(name)
    }
}
