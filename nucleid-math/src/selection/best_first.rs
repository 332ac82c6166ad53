use std::collections::HashMap;

use log::{debug, info, warn};

use crate::errors::MathError;
use crate::feature::{compact_features, mark_selected, Feature};
use crate::glm::Glm;
use crate::matrix::Matrix;
use crate::selection::Node;

/// Direction and margin of the subset comparison.
#[derive(Debug, Clone, Copy)]
pub enum Goal {
    /// Minimize the score; a new subset wins iff `old − new > margin`.
    Minimize {
        /// required improvement
        margin: f64,
    },
    /// Maximize the score; a new subset wins iff `new − old > margin`.
    Maximize {
        /// required improvement
        margin: f64,
    },
}

impl Goal {
    fn is_new_better(&self, new_value: f64, old_value: f64) -> bool {
        match *self {
            Goal::Minimize { margin } => old_value - new_value > margin,
            Goal::Maximize { margin } => new_value - old_value > margin,
        }
    }

    /// The value no real evaluation can be worse than.
    fn worst(&self) -> f64 {
        match self {
            Goal::Minimize { .. } => f64::INFINITY,
            Goal::Maximize { .. } => f64::NEG_INFINITY,
        }
    }
}

/// Best-first search over feature subsets.
///
/// Nodes are sorted index sets; expansion is add-one/drop-one; every candidate subset is
/// scored by fitting a linear model on the selected columns (bias column prepended) and
/// evaluating it on the training labels. The search keeps going while the best subset is
/// smaller than `min_features` or fewer than `patience` expansions have passed without an
/// accepted improvement; it stops when both conditions fail or the open set drains.
///
/// A subset whose fit hits a singular matrix is logged and scored worst-possible; the
/// search continues.
pub struct BestFirst {
    best: Node,
    features: Vec<Feature>,
}

/// Callbacks for one search: how to fit a candidate model and how to score it.
pub struct SearchModel<'a> {
    /// fits a model on (features-with-bias, labels)
    pub fit: &'a (dyn Fn(&Matrix, &Matrix) -> Result<Glm, MathError> + Sync),
    /// scores (labels, predictions)
    pub evaluate: &'a (dyn Fn(&Matrix, &Matrix) -> Result<f64, MathError> + Sync),
    pub goal: Goal,
}

impl BestFirst {
    /// Default expansions-without-improvement budget.
    pub const PATIENCE: usize = 3;

    /// Runs the search on a training table.
    pub fn search(
        table: &Matrix,
        labels: &Matrix,
        features: &[Feature],
        model: &SearchModel,
        min_features: usize,
        thread_num: usize,
    ) -> Result<BestFirst, MathError> {
        let feature_count = table.cols();
        let goal = model.goal;
        let worst = goal.worst();

        let mut open: HashMap<Node, f64> = HashMap::new();
        let mut closed: HashMap<Node, f64> = HashMap::new();

        let mut best = Node::empty();
        let mut best_value = worst;
        open.insert(Node::empty(), worst);

        let mut no_improvement = 0usize;
        while (best.size() < min_features || no_improvement < Self::PATIENCE) && !open.is_empty() {
            let (node, value) = find_optimum(&open, goal)?;
            open.remove(&node);
            closed.insert(node.clone(), value);

            if goal.is_new_better(value, best_value)
                || (best.size() < min_features && no_improvement >= Self::PATIENCE)
            {
                best = node.clone();
                best_value = value;
                no_improvement = 0;
                info!("Better performance of: {}", best_value);
                for &i in best.list() {
                    debug!("\t{}", features[i].name);
                }
            }

            let candidates: Vec<Node> = node
                .expand(feature_count)
                .into_iter()
                .filter(|child| !open.contains_key(child) && !closed.contains_key(child))
                .collect();
            no_improvement += 1;

            let scores = evaluate_children(table, labels, &candidates, model, thread_num)?;
            for (child, score) in candidates.into_iter().zip(scores) {
                open.insert(child, score);
            }
        }

        info!("Selected statistics:");
        for &i in best.list() {
            info!("\t{}", features[i].name);
        }

        Ok(BestFirst {
            best,
            features: features.to_vec(),
        })
    }

    /// Rebuilds the search result from features whose selection flags were restored,
    /// e.g. after deserializing a model.
    pub fn from_selected(features: &[Feature]) -> Result<BestFirst, MathError> {
        let list: Vec<usize> = features
            .iter()
            .filter(|f| f.is_selected)
            .map(|f| f.table_index)
            .collect();
        Ok(BestFirst {
            best: Node::new(list)?,
            features: features.to_vec(),
        })
    }

    /// The winning subset.
    pub fn best(&self) -> &Node {
        &self.best
    }

    /// Projects a table onto the winning subset and prepends the bias column.
    pub fn transform(&self, m: &Matrix) -> Result<Matrix, MathError> {
        Ok(m.sub_matrix_by_col(self.best.list())?.append_ones_column())
    }

    /// The selected and needed features, compacted and re-indexed.
    pub fn feature_list(&self) -> Vec<Feature> {
        let mut features = self.features.clone();
        for &i in self.best.list() {
            mark_selected(&mut features, i);
        }
        compact_features(&features)
    }
}

fn find_optimum(open: &HashMap<Node, f64>, goal: Goal) -> Result<(Node, f64), MathError> {
    if open.is_empty() {
        return Err(MathError::EmptyOpenSet);
    }
    let mut best: Option<(&Node, f64)> = None;
    for (node, &value) in open {
        let better = match (&best, goal) {
            (None, _) => true,
            (Some((_, v)), Goal::Minimize { .. }) => value < *v,
            (Some((_, v)), Goal::Maximize { .. }) => value > *v,
        };
        if better {
            best = Some((node, value));
        }
    }
    let (node, value) = best.ok_or(MathError::EmptyOpenSet)?;
    Ok((node.clone(), value))
}

/// Scores candidate subsets in parallel with a static partition by index.
fn evaluate_children(
    table: &Matrix,
    labels: &Matrix,
    candidates: &[Node],
    model: &SearchModel,
    thread_num: usize,
) -> Result<Vec<f64>, MathError> {
    let worst = model.goal.worst();
    let evaluate_one = |child: &Node| -> Result<f64, MathError> {
        if child.size() == 0 {
            return Ok(worst);
        }
        let sub = table
            .sub_matrix_by_col(child.list())?
            .append_ones_column();
        let fitted = match (model.fit)(&sub, labels) {
            Ok(glm) => glm,
            Err(MathError::Singular) => {
                warn!("A feature subset was skipped (singular fit): {:?}", child.list());
                return Ok(worst);
            }
            Err(e) => return Err(e),
        };
        (model.evaluate)(labels, &fitted.transform(&sub)?)
    };

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let threads = thread_num.clamp(1, candidates.len());
    let chunk = candidates.len().div_ceil(threads);
    let evaluate_one = &evaluate_one;
    let mut results: Vec<Result<f64, MathError>> = Vec::with_capacity(candidates.len());
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for part in candidates.chunks(chunk) {
            handles.push(scope.spawn(move || part.iter().map(evaluate_one).collect::<Vec<_>>()));
        }
        for handle in handles {
            match handle.join() {
                Ok(part) => results.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });

    results.into_iter().collect()
}
