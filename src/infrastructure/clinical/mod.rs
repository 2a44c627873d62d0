//! Clinical label adapters

mod openfda;

pub use openfda::{
    clinical_terms, infer_dosage_form, infer_strength, OpenFdaClinicalRetriever,
    DEFAULT_OPENFDA_BASE_URL, OPENFDA_SOURCE,
};
