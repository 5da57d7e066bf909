use metaseek::adducts::{
    AdductSpec,
    AdductTable,
};
use metaseek::candidates::generate;
use metaseek::data_sources::{
    FeatureTableFormat,
    LibraryFormat,
};
use metaseek::errors::ScoringError;
use metaseek::matching::{
    mass_error_ppm,
    theoretical_mz,
};
use metaseek::rt_prediction::{
    NullRtModel,
    TreeEnsembleRtModel,
};
use metaseek::scoring::{
    candidate_order,
    mass_score,
    rank,
};
use metaseek::{
    AdductPriors,
    Candidate,
    CandidateGenerator,
    EnsembleWeights,
    Feature,
    FeatureTable,
    MetaboliteLibrary,
    MetaboliteRecord,
    Polarity,
    PropertyJoiner,
    Scorer,
};
use std::cmp::Ordering;
use std::io::Cursor;

fn spec(name: &str, polarity: Polarity, delta: f64) -> AdductSpec {
    AdductSpec {
        name: name.into(),
        polarity,
        mass_delta: Some(delta),
        multiplicity: 1,
        charge: 1,
    }
}

fn scenario_table() -> AdductTable {
    AdductTable::from_specs(&[
        spec("[M+H]+", Polarity::Positive, 1.0073),
        spec("[M+Na]+", Polarity::Positive, 22.9892),
        spec("[M-H]-", Polarity::Negative, -1.0073),
    ])
    .unwrap()
}

fn scorer() -> Scorer {
    Scorer::new(5.0, AdductPriors::default(), PropertyJoiner::default()).unwrap()
}

#[test]
fn test_protonated_scenario() {
    let table = scenario_table();
    let features = vec![Feature::new(0, Polarity::Positive, "", 181.0703, 5.2)];
    let metabolites = vec![MetaboliteRecord::new("m", 180.0630)];

    let candidates: Vec<Candidate> = generate(&features, &metabolites, &table, 5.0).collect();
    // [M+Na]+ lands at 203.0522, far outside 5 ppm.
    assert_eq!(candidates.len(), 1);
    let c = candidates[0];
    assert_eq!(c.adduct.name, "[M+H]+");
    assert!((c.theoretical_mz - 181.0703).abs() < 1e-9);
    assert!(c.mass_error_ppm.abs() < 1e-6);

    let scored = scorer().score(c, &NullRtModel).unwrap();
    assert!((scored.mass_score - 1.0).abs() < 1e-12);
}

#[test]
fn test_sodium_scenario_is_not_emitted() {
    let table = scenario_table();
    let na = table.get("[M+Na]+").unwrap();
    assert!((theoretical_mz(180.0630, na) - 203.0522).abs() < 1e-9);

    let features = vec![Feature::new(0, Polarity::Positive, "", 181.0703, 5.2)];
    let metabolites = vec![MetaboliteRecord::new("m", 180.0630)];
    assert!(generate(&features, &metabolites, &table, 5.0).all(|c| c.adduct.name != "[M+Na]+"));
}

#[test]
fn test_unknown_adduct_is_dropped_and_run_continues() {
    let mut specs = vec![spec("[M+H]+", Polarity::Positive, 1.0073)];
    specs.push(spec("[M+Xe]+", Polarity::Positive, 131.9036));
    let table = AdductTable::from_specs(&specs).unwrap();
    let metabolites = vec![MetaboliteRecord::new("m", 180.0630)];
    let features = vec![Feature::new(0, Polarity::Positive, "", 181.0703, 5.2)];

    let precomputed: Vec<Candidate> = table
        .as_slice()
        .iter()
        .map(|a| Candidate::from_parts(&features[0], &metabolites[0], a))
        .collect();

    assert!(matches!(
        scorer().score(precomputed[1], &NullRtModel),
        Err(ScoringError::UnknownAdduct { ref name }) if name == "[M+Xe]+"
    ));

    let (scored, metrics) = scorer().score_batch(&precomputed, &NullRtModel);
    assert_eq!(metrics.num_unknown_adduct, 1);
    let ranked = rank(scored, &EnsembleWeights::default());
    let group = &ranked[&0];
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].candidate.adduct.name, "[M+H]+");
    assert_eq!(group[0].rank, 1);
}

/// A deterministic grid of features and metabolites around a few masses.
fn synthetic_inputs(table: &AdductTable) -> (Vec<Feature>, Vec<MetaboliteRecord>) {
    let metabolites: Vec<MetaboliteRecord> = (0..60)
        .map(|i| {
            let mass = 100.0 + (i / 3) as f64 * 7.123 + (i % 3) as f64 * 0.0004;
            MetaboliteRecord::new(format!("M{:03}", i), mass)
        })
        .collect();

    let mut features = Vec::new();
    for (i, m) in metabolites.iter().enumerate().step_by(4) {
        for adduct in table.as_slice() {
            let theo = theoretical_mz(m.monoisotopic_mass, adduct);
            let jitter = ((i % 7) as f64 - 3.0) * 1e-6 * theo;
            features.push(Feature::new(
                features.len(),
                adduct.polarity,
                m.id.clone(),
                theo + jitter,
                (i % 11) as f64,
            ));
        }
    }
    (features, metabolites)
}

#[test]
fn test_generated_candidates_are_within_tolerance_and_consistent() {
    let table = AdductTable::default();
    let (features, metabolites) = synthetic_inputs(&table);
    for tol in [1.0, 5.0, 20.0] {
        let all: Vec<Candidate> = generate(&features, &metabolites, &table, tol).collect();
        assert!(!all.is_empty());
        for c in all.iter() {
            assert!(c.mass_error_ppm.abs() <= tol);
            assert_eq!(c.adduct.polarity, c.feature.mode);
            let theo = theoretical_mz(c.metabolite.monoisotopic_mass, c.adduct);
            assert_eq!(theo, c.theoretical_mz);
            assert_eq!(mass_error_ppm(c.feature.mz, theo), c.mass_error_ppm);
        }

        let generator = CandidateGenerator::new(&metabolites, &table, tol)
            .unwrap()
            .with_index();
        let indexed: Vec<Candidate> = generator.iter(&features).collect();
        assert_eq!(indexed, all);
    }
}

#[test]
fn test_generation_order_is_deterministic() {
    let table = AdductTable::default();
    let (features, metabolites) = synthetic_inputs(&table);
    let all: Vec<Candidate> = generate(&features, &metabolites, &table, 10.0).collect();
    let metabolite_pos = |m: &MetaboliteRecord| metabolites.iter().position(|x| x.id == m.id).unwrap();
    for pair in all.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let key_a = (a.feature.id, metabolite_pos(a.metabolite), a.adduct.order);
        let key_b = (b.feature.id, metabolite_pos(b.metabolite), b.adduct.order);
        assert!(key_a < key_b, "{:?} !< {:?}", key_a, key_b);
    }
}

#[test]
fn test_mass_score_monotonic_in_abs_error() {
    let errors: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
    for tol in [2.0, 5.0, 10.0] {
        let scores: Vec<f64> = errors.iter().map(|e| mass_score(*e, tol)).collect();
        assert!(scores.windows(2).all(|w| w[1] <= w[0]));
        assert!((mass_score(tol, tol) - (-1.0f64).exp()).abs() < 1e-12);
    }
}

#[test]
fn test_ranking_is_a_total_order() {
    let table = AdductTable::default();
    let (features, mut metabolites) = synthetic_inputs(&table);
    // Same-mass isomers, listed ahead of their twins.
    let isomers: Vec<MetaboliteRecord> = metabolites
        .iter()
        .step_by(5)
        .map(|m| MetaboliteRecord::new(format!("ISO-{}", m.id), m.monoisotopic_mass))
        .collect();
    metabolites.splice(0..0, isomers);

    let candidates: Vec<Candidate> = generate(&features, &metabolites, &table, 10.0).collect();
    let (scored, _) = scorer().score_batch(&candidates, &NullRtModel);
    let weights = EnsembleWeights::new(1.0, 0.5, 0.25).unwrap();
    let ranked = rank(scored.clone(), &weights);
    let has_isomer_tie = ranked.values().any(|g| {
        g.windows(2).any(|p| {
            p[0].ensemble_score == p[1].ensemble_score
                && p[0].candidate.adduct.order == p[1].candidate.adduct.order
        })
    });
    assert!(has_isomer_tie);

    let mut reversed_input = scored;
    reversed_input.reverse();
    let reversed = rank(reversed_input, &weights);

    for (feature_id, group) in ranked.iter() {
        let other = &reversed[feature_id];
        assert_eq!(group.len(), other.len());
        for (a, b) in group.iter().zip(other.iter()) {
            assert_eq!(a.candidate.metabolite.id, b.candidate.metabolite.id);
            assert_eq!(a.candidate.adduct.name, b.candidate.adduct.name);
        }
        for (i, pair) in group.windows(2).enumerate() {
            assert_eq!(candidate_order(&pair[0], &pair[1]), Ordering::Less);
            assert!(pair[0].ensemble_score >= pair[1].ensemble_score);
            assert_eq!(pair[0].rank, i + 1);
            assert_eq!(pair[1].rank, i + 2);
        }
    }
}

const FEATURES_TSV: &str = "mode\tmetabolite\tMW\tm/z\tRT\n\
pos_HILIC\tglucose\t180.0634\t181.070665\t2.0\n\
neg_HILIC\tcitrate\t192.0270\t191.019726\t6.0\n\
unknown\tignored\t1.0\t2.0\t3.0\n";

const LIBRARY_NDJSON: &str = r#"{"accession": "HMDB0000122", "name": "D-Glucose", "monoisotopic_mass": 180.063388, "formula": "C6H12O6", "properties": {"logp": -3.2}}
{"accession": "HMDB0000660", "name": "D-Fructose", "monoisotopic_mass": 180.063388, "formula": "C6H12O6", "properties": {"logp": 1.5}}
{"accession": "HMDB0000094", "name": "Citric acid", "monoisotopic_mass": 192.027002, "formula": "C6H8O7"}
"#;

const RT_FOREST: &str = r#"{
    "aggregation": "mean",
    "residual_stddev": 0.5,
    "trees": [
        {"nodes": [
            {"feature": "logp", "threshold": 0.0, "left": 1, "right": 2, "missing_left": true},
            {"value": 2.0},
            {"value": 8.0}
        ]}
    ]
}"#;

#[test]
fn test_pipeline_from_readers() {
    let features = FeatureTable::from_reader(Cursor::new(FEATURES_TSV), FeatureTableFormat::Tsv).unwrap();
    assert_eq!(features.len(), 2);
    let library = MetaboliteLibrary::from_reader(Cursor::new(LIBRARY_NDJSON), LibraryFormat::NdJson).unwrap();
    let rt_model = TreeEnsembleRtModel::from_json(RT_FOREST).unwrap();
    let table = AdductTable::default();

    let generator = CandidateGenerator::new(library.as_slice(), &table, 5.0)
        .unwrap()
        .with_index();
    let candidates: Vec<Candidate> = generator.par_generate(features.as_slice()).concat();
    let (scored, metrics) = scorer().score_batch(&candidates, &rt_model);
    assert_eq!(metrics.num_unknown_adduct, 0);
    assert_eq!(metrics.num_neutral_rt, 0);
    let ranked = rank(scored, &EnsembleWeights::default());

    // The two hexose isomers only differ by their predicted retention time.
    let glucose = &ranked[&0];
    assert_eq!(glucose.len(), 2);
    assert_eq!(glucose[0].candidate.metabolite.id, "HMDB0000122");
    assert_eq!(glucose[0].rt_score, 1.0);
    assert_eq!(glucose[1].candidate.metabolite.id, "HMDB0000660");
    assert!(glucose[1].rt_score < 1e-10);

    // Citrate has no logp and falls to the missing branch (2.0 min), far from 6.0.
    let citrate = &ranked[&1];
    assert_eq!(citrate.len(), 1);
    assert_eq!(citrate[0].candidate.adduct.name, "[M-H]-");
    assert!(citrate[0].rt_prediction.is_some());
}
