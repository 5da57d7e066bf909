use super::config::{
    OutputConfig,
    ResolvedInputs,
};
use crate::errors::CliError;
use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use metaseek::data_sources::{
    FeatureTable,
    MetaboliteLibrary,
    PropertyTable,
};
use metaseek::models::{
    Candidate,
    Feature,
};
use metaseek::rt_prediction::RtPredictor;
use metaseek::scoring::{
    rank,
    AnnotationWriter,
    EnsembleWeights,
    Scorer,
    ScoringMetrics,
};
use metaseek::CandidateGenerator;
use serde::Serialize;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    debug,
    info,
};

pub struct RunInputs {
    pub features: FeatureTable,
    pub library: MetaboliteLibrary,
    pub properties: Option<PropertyTable>,
}

pub fn load_inputs(inputs: &ResolvedInputs) -> metaseek::Result<RunInputs> {
    let st = Instant::now();
    let features = FeatureTable::from_file(&inputs.features)?;
    let library = MetaboliteLibrary::from_file(&inputs.metabolites)?;
    let properties = match &inputs.properties {
        Some(path) => Some(PropertyTable::from_file(path)?),
        None => None,
    };
    info!(
        "Loaded {} features and {} metabolites in {:?}",
        features.len(),
        library.len(),
        st.elapsed()
    );
    Ok(RunInputs {
        features,
        library,
        properties,
    })
}

#[derive(Debug, Default, Serialize)]
pub struct RunMetrics {
    pub num_features: usize,
    pub num_features_with_candidates: usize,
    pub num_candidates: usize,
    pub num_rows_written: usize,
    pub num_chunks: usize,
    pub scoring: ScoringMetrics,
    #[serde(skip)]
    pub elapsed: Duration,
}

pub fn main_loop<'a>(
    features: &'a [Feature],
    generator: &CandidateGenerator<'a>,
    scorer: &Scorer,
    rt_model: &dyn RtPredictor,
    weights: &EnsembleWeights,
    chunk_size: usize,
    writer: &mut AnnotationWriter,
) -> std::result::Result<RunMetrics, CliError> {
    let start = Instant::now();
    let mut metrics = RunMetrics::default();

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    for chunk in features.chunks(chunk_size).progress_with_style(style) {
        metrics.num_features += chunk.len();
        // Parallelism happens within generation and scoring.
        let per_feature = generator.par_generate(chunk);
        metrics.num_features_with_candidates += per_feature.iter().filter(|x| !x.is_empty()).count();
        let candidates: Vec<Candidate> = per_feature.into_iter().flatten().collect();
        metrics.num_candidates += candidates.len();

        let (scored, chunk_metrics) = scorer.score_batch(&candidates, rt_model);
        metrics.scoring += chunk_metrics;

        let ranked = rank(scored, weights);
        let best = ranked
            .values()
            .filter_map(|x| x.first())
            .max_by(|a, b| a.ensemble_score.total_cmp(&b.ensemble_score));
        let worst = ranked
            .values()
            .filter_map(|x| x.first())
            .min_by(|a, b| a.ensemble_score.total_cmp(&b.ensemble_score));
        if let (Some(best), Some(worst)) = (best, worst) {
            debug!("Best top candidate in chunk: {:#?}", best);
            debug!("Worst top candidate in chunk: {:#?}", worst);
        }

        metrics.num_rows_written += writer.write_ranked(&ranked)?;
        metrics.num_chunks += 1;
    }

    metrics.elapsed = start.elapsed();
    Ok(metrics)
}

pub fn process<'a>(
    inputs: &'a RunInputs,
    generator: &CandidateGenerator<'a>,
    scorer: &Scorer,
    rt_model: &dyn RtPredictor,
    weights: &EnsembleWeights,
    chunk_size: usize,
    output: &OutputConfig,
) -> std::result::Result<RunMetrics, CliError> {
    let mut writer = AnnotationWriter::new(&output.directory, "annotations", output.format, output.top_k)?;
    let metrics = main_loop(
        inputs.features.as_slice(),
        generator,
        scorer,
        rt_model,
        weights,
        chunk_size,
        &mut writer,
    )?;
    let paths = writer.close()?;

    info!(
        "Processed {} features ({} with candidates), scored {} of {} candidates, wrote {} rows",
        metrics.num_features,
        metrics.num_features_with_candidates,
        metrics.scoring.num_scored,
        metrics.num_candidates,
        metrics.num_rows_written
    );
    info!(
        "Dropped {} candidates without adduct prior and {} with an invalid mass, {} scored with neutral rt",
        metrics.scoring.num_unknown_adduct,
        metrics.scoring.num_invalid_mass,
        metrics.scoring.num_neutral_rt
    );
    info!(
        "Finished processing {} chunks in {:?}, results at {:?}",
        metrics.num_chunks, metrics.elapsed, paths
    );
    match serde_json::to_string(&metrics) {
        Ok(x) => info!("Run metrics: {}", x),
        Err(e) => debug!("Unable to serialize run metrics: {}", e),
    }
    Ok(metrics)
}
