use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use rand::SeedableRng as _;
use rand_pcg::Pcg64;
use reviewcv_data::{
    context::ExperimentContext,
    game::{games_label, parse_games_string},
    label::{Label, parse_non_nlp_features_string},
    store::{ReviewStore as _, SqliteStore},
};
use reviewcv_experiment::{
    bins::label_bin_ranges,
    config::RawCvConfig,
    feature_weights::write_feature_weights,
    report::ReportWriter,
    runner::run_experiment,
    stats::{LearnerSummary, StatsRecord},
};
use reviewcv_learn::{
    learner::{LearnerKind, parse_learners_string},
    params::{ParamGrid, ParamSet},
};
use reviewcv_stats::binning::format_bin_ranges;
use serde::Serialize;

use crate::{
    logging,
    util::{self, JsonOutput},
};

const LOG_FILE_NAME: &str = "learn.log";
const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Objective value that selects each learner's own score.
const DEFAULT_OBJECTIVE: &str = "default";

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CvLearnArg {
    /// SQLite database holding the review documents
    #[arg(long, default_value = "reviews.db")]
    db_path: PathBuf,
    /// Games to use: a comma-separated list of game names or "all"
    #[arg(long)]
    games: String,
    /// Directory receiving reports and logs
    #[arg(long)]
    output_dir: PathBuf,
    /// Number of training folds
    #[arg(long, default_value_t = 3)]
    training_rounds: i64,
    /// Number of reviews per training fold
    #[arg(long, default_value_t = 100)]
    max_training_samples_per_round: i64,
    /// Number of grid search folds
    #[arg(long, default_value_t = 5)]
    grid_search_folds: i64,
    /// Number of reviews per grid search fold
    #[arg(long, default_value_t = 1000)]
    max_grid_search_samples_per_fold: i64,
    /// Review attribute to predict
    #[arg(long, default_value = "total_game_hours_bin")]
    prediction_label: String,
    /// Review attributes used as extra features: a comma-separated list,
    /// "all" or "none"
    #[arg(long, default_value = "none")]
    non_nlp_features: String,
    /// Use only the non-NLP features
    #[arg(long)]
    only_non_nlp_features: bool,
    /// How reviews are drawn: "even" or "stratified"
    #[arg(long, default_value = "even")]
    data_sampling: String,
    /// Learners to run: a comma-separated list of names or abbreviations, or
    /// "all"
    #[arg(long, default_value = "all")]
    learners: String,
    /// JSON file with one parameter grid per learner, in sorted learner order
    #[arg(long)]
    param_grids_file: Option<PathBuf>,
    /// Number of bins to collapse the prediction label into (0 disables
    /// binning)
    #[arg(long, default_value_t = 0)]
    nbins: usize,
    /// Factor by which each bin is wider than the previous one
    #[arg(long)]
    bin_factor: Option<f64>,
    /// Take the natural logarithm of the prediction label
    #[arg(long)]
    lognormal: bool,
    /// Raise the prediction label to this power
    #[arg(long)]
    power_transform: Option<f64>,
    /// Hash features instead of learning a vocabulary
    #[arg(long)]
    use_feature_hasher: bool,
    /// Rescale predictions to the distribution of the training labels
    #[arg(long)]
    rescale_predictions: bool,
    /// Objective function used in grid search, or "default" for each
    /// learner's own score
    #[arg(long, default_value = "qwk")]
    obj_func: String,
    /// Also evaluate a majority label baseline
    #[arg(long)]
    evaluate_majority_baseline: bool,
    /// Write the feature weights of learners that expose them
    #[arg(long)]
    save_best_features: bool,
    /// Log file path [default: <output-dir>/logs/learn.log]
    #[arg(long)]
    log_file_path: Option<PathBuf>,
    /// Seed of the review sampler
    #[arg(long, default_value_t = 12345)]
    seed: u64,
    /// Print the cross-validation summaries to stdout
    #[arg(long)]
    print_summary: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    games: String,
    seed: u64,
    config: &'a RawCvConfig,
    grid_search_folds: usize,
    training_folds: usize,
    classes: &'a [f64],
    best_params: BTreeMap<&'static str, &'a ParamSet>,
    summaries: &'a [LearnerSummary],
    majority_baseline: Option<&'a StatsRecord>,
    reports: Vec<PathBuf>,
}

pub(crate) fn run(arg: &CvLearnArg) -> anyhow::Result<()> {
    let started_at = Utc::now();
    util::prepare_output_dir(&arg.output_dir)?;
    let log_path = arg
        .log_file_path
        .clone()
        .unwrap_or_else(|| arg.output_dir.join("logs").join(LOG_FILE_NAME));
    util::check_log_path(&log_path)?;
    let _guard = logging::init(&log_path)?;

    let mut raw = raw_config(arg)?;
    let save_best_features = resolve_save_best_features(
        arg.save_best_features,
        arg.use_feature_hasher,
        &parse_learners_string(&arg.learners).context("Invalid --learners")?,
    )?;
    let bin_factor = resolve_bin_factor(arg.nbins, arg.bin_factor)?;
    // Everything but the bin ranges is checked before the datastore is opened.
    let config = raw.validate()?;

    let store = open_store(&arg.db_path)?;

    let config = match bin_factor {
        Some(factor) => {
            let ranges = label_bin_ranges(
                &store,
                config.games(),
                config.prediction_label(),
                config.transform(),
                arg.nbins,
                factor,
            )
            .context("Failed to compute bin ranges")?;
            tracing::info!(
                nbins = arg.nbins,
                bin_factor = factor,
                transformation = %config.transform(),
                bin_ranges = %format_bin_ranges(&ranges),
                "binning prediction label"
            );
            raw.bin_ranges = Some(ranges);
            raw.validate()?
        }
        None => config,
    };

    let games = games_label(config.games());
    let ctx = ExperimentContext::new(format!("{games}@{}", started_at.format("%Y%m%dT%H%M%S")));
    let mut rng = Pcg64::seed_from_u64(arg.seed);
    let results = run_experiment(&config, &store, &mut rng, &ctx).context("Experiment failed")?;

    let writer = ReportWriter::new(&arg.output_dir, config.games());
    let mut reports = vec![];
    for learner in &results.learners {
        reports.extend(writer.write_learner_stats(&learner.stats)?);
    }
    if let Some(baseline) = &results.majority_baseline {
        reports.push(writer.write_majority_baseline(baseline)?);
    }
    let summaries = results.summaries();
    reports.push(writer.write_summary(&summaries)?);
    if save_best_features {
        let files = write_feature_weights(&results, &writer)?;
        reports.extend(files.weights);
        reports.extend(files.readme);
    }

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        games,
        seed: arg.seed,
        config: &raw,
        grid_search_folds: results.data.grid_search_folds(),
        training_folds: results.data.folds(),
        classes: results.data.classes(),
        best_params: results
            .learners
            .iter()
            .map(|l| (l.kind.name(), &l.grid_search.best_params))
            .collect(),
        summaries: &summaries,
        majority_baseline: results.majority_baseline.as_ref(),
        reports,
    };
    let summary_path = arg.output_dir.join(RUN_SUMMARY_FILE);
    JsonOutput::File(summary_path.clone()).write(&summary)?;
    if arg.print_summary {
        JsonOutput::Stdout.write(&summaries)?;
    }

    tracing::info!(
        reports = summary.reports.len(),
        summary = %summary_path.display(),
        "complete"
    );
    Ok(())
}

/// Opens the datastore and makes sure reviews can be looked up by ID.
/// Failures are logged before they are returned.
fn open_store(db_path: &Path) -> anyhow::Result<SqliteStore> {
    let path = db_path.display();
    let store = SqliteStore::open(db_path)
        .inspect_err(|e| tracing::error!(%path, "failed to open datastore: {e}"))
        .with_context(|| format!("Failed to open datastore: {path}"))?;
    store
        .ensure_id_index()
        .inspect_err(|e| tracing::error!(%path, "failed to create the review ID index: {e}"))
        .context("Failed to create the review ID index")?;
    Ok(store)
}

/// Turns the command line into an unvalidated configuration. Names are
/// resolved here; ranges and combinations are left to validation.
fn raw_config(arg: &CvLearnArg) -> anyhow::Result<RawCvConfig> {
    let prediction_label = arg
        .prediction_label
        .parse::<Label>()
        .context("Invalid --prediction-label")?;
    let games = parse_games_string(&arg.games).context("Invalid --games")?;
    let mut learners = parse_learners_string(&arg.learners).context("Invalid --learners")?;
    learners.sort_by_key(|l| l.name());
    let non_nlp_features = parse_non_nlp_features_string(&arg.non_nlp_features, prediction_label)
        .context("Invalid --non-nlp-features")?;
    if arg.only_non_nlp_features && non_nlp_features.is_empty() {
        bail!("--only-non-nlp-features requires a non-empty --non-nlp-features set");
    }
    let param_grids = arg
        .param_grids_file
        .as_ref()
        .map(|path| util::read_json_file::<Vec<ParamGrid>, _>("parameter grids", path))
        .transpose()?;
    let objective = (arg.obj_func != DEFAULT_OBJECTIVE).then(|| arg.obj_func.clone());

    Ok(RawCvConfig {
        games: games.iter().map(|g| g.name().to_owned()).collect(),
        learners: learners.iter().map(|l| l.name().to_owned()).collect(),
        param_grids,
        training_rounds: arg.training_rounds,
        training_samples_per_round: arg.max_training_samples_per_round,
        grid_search_samples_per_fold: arg.max_grid_search_samples_per_fold,
        grid_search_folds: arg.grid_search_folds,
        non_nlp_features: non_nlp_features
            .iter()
            .map(|l| l.as_str().to_owned())
            .collect(),
        prediction_label: prediction_label.as_str().to_owned(),
        objective,
        data_sampling: arg.data_sampling.clone(),
        hashed_features: arg.use_feature_hasher.then_some(0),
        nlp_features: !arg.only_non_nlp_features,
        bin_ranges: None,
        lognormal: arg.lognormal,
        power_transform: arg.power_transform,
        majority_baseline: arg.evaluate_majority_baseline,
        rescale: arg.rescale_predictions,
    })
}

/// Bin growth factor to use, or `None` when binning is off.
fn resolve_bin_factor(nbins: usize, bin_factor: Option<f64>) -> anyhow::Result<Option<f64>> {
    match (nbins, bin_factor) {
        (0, None) => Ok(None),
        (0, Some(_)) => bail!("--bin-factor requires --nbins to be set"),
        (_, Some(factor)) if factor <= 0.0 => {
            bail!("--bin-factor must be positive, got {factor}")
        }
        (_, factor) => Ok(Some(factor.unwrap_or(1.0))),
    }
}

fn resolve_save_best_features(
    requested: bool,
    use_feature_hasher: bool,
    learners: &[LearnerKind],
) -> anyhow::Result<bool> {
    if !requested {
        return Ok(false);
    }
    if use_feature_hasher {
        bail!("--save-best-features cannot be used with --use-feature-hasher");
    }
    if !learners.iter().any(|l| l.is_introspectable()) {
        tracing::info!(
            "none of the selected learners exposes feature weights, ignoring --save-best-features"
        );
        return Ok(false);
    }
    Ok(true)
}
