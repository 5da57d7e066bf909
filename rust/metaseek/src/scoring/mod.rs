mod ranker;
mod scorer;
pub mod search_results;

pub use ranker::{
    candidate_order,
    rank,
    EnsembleWeights,
};
pub use scorer::{
    mass_score,
    ScoredCandidate,
    Scorer,
    ScoringMetrics,
    NEUTRAL_RT_SCORE,
};
pub use search_results::{
    AnnotationRow,
    AnnotationWriter,
    OutputFormat,
};
