pub mod adducts;
pub mod candidates;
pub mod data_sources;
pub mod errors;
pub mod matching;
pub mod models;
pub mod properties;
pub mod rt_prediction;
pub mod scoring;
extern crate parquet;
#[macro_use]
extern crate parquet_derive;

pub use adducts::{
    AdductDefinition,
    AdductPriors,
    AdductSpec,
    AdductTable,
};
pub use candidates::CandidateGenerator;
pub use data_sources::{
    FeatureTable,
    MetaboliteLibrary,
    PropertyTable,
};
pub use errors::{
    MetaSeekError,
    Result,
};
pub use models::{
    Candidate,
    Feature,
    MetaboliteRecord,
    Polarity,
};
pub use properties::PropertyJoiner;
pub use rt_prediction::{
    RtModelConfig,
    RtPrediction,
    RtPredictor,
};
pub use scoring::{
    rank,
    EnsembleWeights,
    ScoredCandidate,
    Scorer,
};
