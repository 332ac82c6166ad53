use log::info;

use nucleid_math::selection::{BestFirst, Goal, SearchModel};
use nucleid_math::transform::{FeatureExpander, Normalizer, SimConverter, Transformer};
use nucleid_math::{evaluator, Feature, FeatureKind, Glm, Matrix};

use crate::errors::IdentityError;
use crate::predictor::GlmPredictor;
use crate::stat_info::{column_of, statistic_features};

/// Required MSE improvement for the regression subset search.
pub const DELTA_REGRESSION: f64 = 0.000025;
/// Required accuracy improvement for the classification subset search.
pub const DELTA_CLASSIFICATION: f64 = 0.001;

/// The outcome of training: the compact feature list (bias first, weights filled in)
/// plus the validation metrics of the fitted model.
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    /// bias pseudo-feature first, then selected and needed features in table order
    pub features: Vec<Feature>,
    /// true when the model answers same/different instead of a score
    pub classification: bool,
    /// mean absolute error on the validation half (regression)
    pub abs_error: f64,
    /// mean squared error on the validation half (regression)
    pub sqr_error: f64,
    /// accuracy on the validation half (classification)
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

impl TrainedPipeline {
    /// Columns of the raw statistic table holding the single features, in feature order.
    pub fn single_columns(&self) -> Result<Vec<usize>, IdentityError> {
        single_columns(&self.features)
    }
}

/// Columns of the raw statistic table backing each single feature of a compact list.
pub fn single_columns(features: &[Feature]) -> Result<Vec<usize>, IdentityError> {
    features
        .iter()
        .filter(|f| f.component_count() == 0 && !f.is_bias())
        .map(|f| {
            column_of(&f.name).ok_or_else(|| IdentityError::UnknownFeature {
                name: f.name.clone(),
            })
        })
        .collect()
}

/// Trains the regression pipeline: normalize → similarity-convert → expand → normalize →
/// best-first subset search → final fit, then validates on the held-out half.
///
/// Rows with labels below `threshold` are left out (the regressor learns the upper part
/// of the identity range only); the surviving rows are split alternately into training
/// and validation halves.
pub fn train_regressor(
    feature_table: &Matrix,
    label_table: &Matrix,
    threshold: f64,
    thread_num: usize,
    min_features: usize,
) -> Result<TrainedPipeline, IdentityError> {
    info!("Preparing regression data");
    let positives: Vec<usize> = (0..label_table.rows())
        .filter(|&i| label_table[(i, 0)] >= threshold)
        .collect();
    if positives.is_empty() {
        return Err(IdentityError::EmptyInput {
            stage: "regression training (no rows at or above the threshold)",
        });
    }
    let usable = positives.len() & !1;
    let train_rows: Vec<usize> = positives.iter().copied().take(usable).step_by(2).collect();
    let validate_rows: Vec<usize> = positives
        .iter()
        .copied()
        .take(usable)
        .skip(1)
        .step_by(2)
        .collect();
    info!(
        "\tPositive examples: {} (training {}, validation {})",
        usable,
        train_rows.len(),
        validate_rows.len()
    );

    let f_train = feature_table.sub_matrix(&train_rows)?;
    let l_train = label_table.sub_matrix(&train_rows)?;
    let f_validate = feature_table.sub_matrix(&validate_rows)?;
    let l_validate = label_table.sub_matrix(&validate_rows)?;

    let model = SearchModel {
        fit: &Glm::regressor,
        evaluate: &evaluator::mse,
        goal: Goal::Minimize {
            margin: DELTA_REGRESSION,
        },
    };
    let (features, _) = run_stages(&f_train, &l_train, &model, thread_num, min_features)?;

    let mut trained = TrainedPipeline {
        features,
        classification: false,
        abs_error: 0.0,
        sqr_error: 0.0,
        accuracy: 0.0,
        sensitivity: 0.0,
        specificity: 0.0,
    };
    let train_predicted = predict_rows(&trained, &f_train)?;
    info!(
        "Finished training.\n\tMAE: {}\n\tMSE: {}",
        evaluator::mae(&l_train, &train_predicted)?,
        evaluator::mse(&l_train, &train_predicted)?
    );

    info!("Validating");
    let predicted = predict_rows(&trained, &f_validate)?;
    trained.abs_error = evaluator::mae(&l_validate, &predicted)?;
    trained.sqr_error = evaluator::mse(&l_validate, &predicted)?;
    info!("\tMAE: {}\n\tMSE: {}", trained.abs_error, trained.sqr_error);
    Ok(trained)
}

/// Trains the classification pipeline on a balanced positive/negative split.
///
/// Labels become 1 at or above the threshold and 0 below; `balance` scales how many
/// negatives are kept per positive.
pub fn train_classifier(
    feature_table: &Matrix,
    label_table: &Matrix,
    threshold: f64,
    thread_num: usize,
    min_features: usize,
    balance: f64,
) -> Result<TrainedPipeline, IdentityError> {
    info!("Preparing classification data");
    let rows = label_table.rows();
    let num_positive = (0..rows)
        .filter(|&i| label_table[(i, 0)] >= threshold)
        .count();
    let num_negative = rows - num_positive;
    if num_positive == 0 {
        return Err(IdentityError::EmptyInput {
            stage: "classification training (no positives)",
        });
    }
    if num_negative == 0 {
        return Err(IdentityError::EmptyInput {
            stage: "classification training (no negatives)",
        });
    }

    let smaller = num_positive.min(num_negative) & !1;
    let keep_positive = smaller;
    let keep_negative = (((balance * smaller as f64) as usize) & !1).min(num_negative & !1);

    let mut train_rows = Vec::new();
    let mut validate_rows = Vec::new();
    let mut train_labels = Vec::new();
    let mut validate_labels = Vec::new();
    let mut taken_positive = 0;
    let mut taken_negative = 0;
    for i in 0..rows {
        let positive = label_table[(i, 0)] >= threshold;
        if positive && taken_positive < keep_positive {
            if taken_positive % 2 == 0 {
                train_rows.push(i);
                train_labels.push(vec![1.0]);
            } else {
                validate_rows.push(i);
                validate_labels.push(vec![1.0]);
            }
            taken_positive += 1;
        } else if !positive && taken_negative < keep_negative {
            if taken_negative % 2 == 0 {
                train_rows.push(i);
                train_labels.push(vec![0.0]);
            } else {
                validate_rows.push(i);
                validate_labels.push(vec![0.0]);
            }
            taken_negative += 1;
        }
    }
    info!(
        "\tSimilar pair count: {}\n\tDissimilar pair count: {}\n\tTraining size: {}\n\tValidation size: {}",
        taken_positive,
        taken_negative,
        train_rows.len(),
        validate_rows.len()
    );

    let f_train = feature_table.sub_matrix(&train_rows)?;
    let l_train = Matrix::from_rows(train_labels)?;
    let f_validate = feature_table.sub_matrix(&validate_rows)?;
    let l_validate = Matrix::from_rows(validate_labels)?;

    let model = SearchModel {
        fit: &Glm::classifier,
        evaluate: &evaluator::acc,
        goal: Goal::Maximize {
            margin: DELTA_CLASSIFICATION,
        },
    };
    let (features, _) = run_stages(&f_train, &l_train, &model, thread_num, min_features)?;

    let mut trained = TrainedPipeline {
        features,
        classification: true,
        abs_error: 0.0,
        sqr_error: 0.0,
        accuracy: 0.0,
        sensitivity: 0.0,
        specificity: 0.0,
    };

    info!("Validating");
    let predicted = predict_rows(&trained, &f_validate)?;
    trained.accuracy = evaluator::acc(&l_validate, &predicted)?;
    trained.sensitivity = evaluator::sens(&l_validate, &predicted)?;
    trained.specificity = evaluator::spec(&l_validate, &predicted)?;
    info!(
        "\tAccuracy: {}\n\tSensitivity: {}\n\tSpecificity: {}",
        trained.accuracy, trained.sensitivity, trained.specificity
    );
    Ok(trained)
}

/// The shared transform chain and subset search; returns the compact feature list with
/// the bias inserted at the front and the final model.
fn run_stages(
    f_train: &Matrix,
    l_train: &Matrix,
    model: &SearchModel,
    thread_num: usize,
    min_features: usize,
) -> Result<(Vec<Feature>, Glm), IdentityError> {
    let singles = statistic_features();

    let normalizer1 = Normalizer::fit(f_train, &singles)?;
    let t1 = normalizer1.transform(f_train)?;
    let f1 = normalizer1.feature_list();

    let converter = SimConverter::fit(&f1);
    let t2 = converter.transform(&t1)?;
    let f2 = converter.feature_list();

    let expander = FeatureExpander::fit(&t2, &f2)?;
    let t3 = expander.transform(&t2)?;
    let f3 = expander.feature_list();

    let normalizer2 = Normalizer::fit(&t3, &f3)?;
    let t4 = normalizer2.transform(&t3)?;
    let f4 = normalizer2.feature_list();

    let search = BestFirst::search(&t4, l_train, &f4, model, min_features, thread_num)?;
    let t5 = search.transform(&t4)?;
    let mut f5 = search.feature_list();

    let glm = match model.goal {
        Goal::Minimize { .. } => Glm::regressor(&t5, l_train)?,
        Goal::Maximize { .. } => Glm::classifier(&t5, l_train)?,
    };

    // The bias is the very first feature and is never selected.
    let weights = glm.weights();
    let mut features = Vec::with_capacity(f5.len() + 1);
    let mut bias = Feature::bias();
    bias.weight = weights[0];
    features.push(bias);
    let mut w = 1;
    for f in f5.iter_mut() {
        if f.is_selected {
            f.weight = weights[w];
            w += 1;
        }
    }
    features.extend(f5);
    for (i, f) in features.iter_mut().enumerate() {
        f.table_index = i;
    }

    Ok((features, glm))
}

/// Applies the trained pipeline to raw statistic rows (all 29 columns), one prediction
/// per row. Used for validation; the hot path lives in [GlmPredictor].
fn predict_rows(trained: &TrainedPipeline, raw: &Matrix) -> Result<Matrix, IdentityError> {
    let predictor = GlmPredictor::from_features(&trained.features, trained.classification)?;
    let columns = trained.single_columns()?;
    let mut predictions = Matrix::zeros(raw.rows(), 1);
    let mut scratch = vec![0.0f64; predictor.feature_count()];
    for r in 0..raw.rows() {
        for (slot, &c) in columns.iter().enumerate() {
            scratch[slot] = raw[(r, c)];
        }
        predictions[(r, 0)] = predictor.calculate_identity(&mut scratch);
    }
    Ok(predictions)
}

/// Statistic indices (bank numbering) of the single features, in order; these are what
/// the statistician computes per pair at inference time.
pub fn single_stat_indices(features: &[Feature]) -> Vec<usize> {
    features
        .iter()
        .filter(|f| f.component_count() == 0 && !f.is_bias())
        .filter_map(|f| match f.kind {
            FeatureKind::Single { stat_index } => Some(stat_index),
            _ => None,
        })
        .collect()
}
