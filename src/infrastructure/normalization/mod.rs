//! Terminology service adapters

mod rxnav;

pub use rxnav::{RxNavNormalizationRetriever, DEFAULT_RXNAV_BASE_URL};
