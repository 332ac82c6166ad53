use std::collections::HashMap;
use std::fs;
use std::path::Path;

use nucleid_math::{Feature, FeatureKind, BIAS_NAME};
use nucleid_seq::kmer::ALPHABET_SIZE;

use crate::errors::IdentityError;
use crate::statistics::Stat;

/// The serialized form of a trained predictor.
///
/// The text format is line-oriented: k, histogram size, absolute error, maximum length,
/// the four composition entries, then one line per feature with twelve tab-separated
/// columns (component count, function index or −1, name with spaces as colons, distance,
/// normalized, min, max, table index, selected, needed, converted, weight). Component
/// links of squared (`X^2`) and paired (`X:x:Y`) features are rebuilt by name on read.
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub k: usize,
    pub hist_size: usize,
    pub abs_error: f64,
    pub max_length: u64,
    pub composition: [f64; ALPHABET_SIZE],
    /// bias first, component indices relative to the remainder of the list
    pub features: Vec<Feature>,
}

impl ModelFile {
    /// Writes the model to a text file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), IdentityError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Renders the model in its line format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.k));
        out.push_str(&format!("{}\n", self.hist_size));
        out.push_str(&format!("{}\n", self.abs_error));
        out.push_str(&format!("{}\n", self.max_length));
        for c in &self.composition {
            out.push_str(&format!("{}\t", c));
        }
        out.push('\n');

        for f in &self.features {
            let fun_index = match f.kind {
                FeatureKind::Single { stat_index } if !f.is_bias() => stat_index as i64,
                _ => -1,
            };
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                f.component_count(),
                fun_index,
                f.name.replace(' ', ":"),
                f.is_distance as u8,
                f.is_normalized as u8,
                f.norm_min,
                f.norm_max,
                f.table_index,
                f.is_selected as u8,
                f.is_needed as u8,
                f.is_converted as u8,
                f.weight
            ));
        }
        out
    }

    /// Reads a model back from its text form.
    pub fn read(path: impl AsRef<Path>) -> Result<ModelFile, IdentityError> {
        Self::from_text(&fs::read_to_string(path)?)
    }

    /// Parses the line format, failing with [UnknownFeature](IdentityError::UnknownFeature)
    /// when a composed feature references an absent component and with
    /// [UnknownStatistic](IdentityError::UnknownStatistic) on a bad function index.
    pub fn from_text(text: &str) -> Result<ModelFile, IdentityError> {
        let mut lines = text.lines().enumerate();
        let mut next_scalar = |what: &str| -> Result<(usize, String), IdentityError> {
            lines
                .next()
                .map(|(n, l)| (n + 1, l.trim().to_owned()))
                .ok_or_else(|| IdentityError::ModelFormat {
                    line: 0,
                    reason: format!("missing {}", what),
                })
        };

        let (line, text_k) = next_scalar("k")?;
        let k: usize = parse(&text_k, line, "k")?;
        let (line, text_size) = next_scalar("histogram size")?;
        let hist_size: usize = parse(&text_size, line, "histogram size")?;
        let (line, text_error) = next_scalar("absolute error")?;
        let abs_error: f64 = parse(&text_error, line, "absolute error")?;
        let (line, text_max) = next_scalar("maximum length")?;
        let max_length: u64 = parse(&text_max, line, "maximum length")?;

        let (line, text_composition) = next_scalar("composition")?;
        let entries: Vec<&str> = text_composition.split_whitespace().collect();
        if entries.len() != ALPHABET_SIZE {
            return Err(IdentityError::ModelFormat {
                line,
                reason: format!("expected {} composition entries", ALPHABET_SIZE),
            });
        }
        let mut composition = [0.0f64; ALPHABET_SIZE];
        for (i, e) in entries.iter().enumerate() {
            composition[i] = parse(e, line, "composition entry")?;
        }

        let mut features: Vec<Feature> = Vec::new();
        // Component lookup is by name, indices relative to the bias-less list.
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (n, raw) in lines {
            let line = n + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = raw.split('\t').collect();
            if columns.len() != 12 {
                return Err(IdentityError::ModelFormat {
                    line,
                    reason: format!("expected 12 feature columns, found {}", columns.len()),
                });
            }
            let component_count: usize = parse(columns[0], line, "component count")?;
            let fun_index: i64 = parse(columns[1], line, "function index")?;
            let name = columns[2].replace(':', " ");

            let mut feature = match component_count {
                0 => {
                    if name == BIAS_NAME {
                        Feature::bias()
                    } else {
                        let stat = Stat::from_index(fun_index)?;
                        Feature::single(stat.index(), &name, stat.is_distance())
                    }
                }
                1 => {
                    let base = squared_component_name(&name);
                    let &component =
                        by_name
                            .get(&base)
                            .ok_or_else(|| IdentityError::UnknownFeature {
                                name: base.clone(),
                            })?;
                    let mut f = Feature::squared(&features[component]);
                    f.name = name.clone();
                    f.kind = FeatureKind::Squared {
                        component: component_index(component, &features)?,
                    };
                    f
                }
                2 => {
                    let (first_name, second_name) = paired_component_names(&name, line)?;
                    let &first = by_name.get(&first_name).ok_or_else(|| {
                        IdentityError::UnknownFeature { name: first_name.clone() }
                    })?;
                    let &second = by_name.get(&second_name).ok_or_else(|| {
                        IdentityError::UnknownFeature { name: second_name.clone() }
                    })?;
                    let mut f = Feature::paired(&features[first], &features[second]);
                    f.name = name.clone();
                    f.kind = FeatureKind::Paired {
                        first: component_index(first, &features)?,
                        second: component_index(second, &features)?,
                    };
                    f
                }
                other => {
                    return Err(IdentityError::ModelFormat {
                        line,
                        reason: format!("invalid component count {}", other),
                    })
                }
            };

            feature.is_distance = parse::<u8>(columns[3], line, "is_distance")? != 0;
            feature.is_normalized = parse::<u8>(columns[4], line, "is_normalized")? != 0;
            feature.norm_min = parse(columns[5], line, "minimum")?;
            feature.norm_max = parse(columns[6], line, "maximum")?;
            feature.table_index = parse(columns[7], line, "table index")?;
            feature.is_selected = parse::<u8>(columns[8], line, "is_selected")? != 0;
            feature.is_needed = parse::<u8>(columns[9], line, "is_needed")? != 0;
            feature.is_converted = parse::<u8>(columns[10], line, "is_converted")? != 0;
            feature.weight = parse(columns[11], line, "weight")?;

            by_name.insert(name, features.len());
            features.push(feature);
        }

        if features.is_empty() {
            return Err(IdentityError::ModelFormat {
                line: 0,
                reason: String::from("the model holds no features"),
            });
        }

        Ok(ModelFile {
            k,
            hist_size,
            abs_error,
            max_length,
            composition,
            features,
        })
    }
}

/// Converts an absolute list position into an index relative to the bias-less remainder.
fn component_index(position: usize, features: &[Feature]) -> Result<usize, IdentityError> {
    let bias_offset = usize::from(!features.is_empty() && features[0].is_bias());
    position
        .checked_sub(bias_offset)
        .ok_or_else(|| IdentityError::UnknownFeature {
            name: String::from(BIAS_NAME),
        })
}

fn parse<T: std::str::FromStr>(text: &str, line: usize, what: &str) -> Result<T, IdentityError> {
    text.parse().map_err(|_| IdentityError::ModelFormat {
        line,
        reason: format!("cannot parse {} from '{}'", what, text),
    })
}

/// `kulczynski_2^2` names the square of `kulczynski_2`.
fn squared_component_name(name: &str) -> String {
    name.split('^').next().unwrap_or(name).to_owned()
}

/// `euclidean x sim_ratio^2` splits at the ` x ` separator.
fn paired_component_names(name: &str, line: usize) -> Result<(String, String), IdentityError> {
    let mut parts = name.splitn(2, " x ");
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => Ok((first.to_owned(), second.to_owned())),
        _ => Err(IdentityError::ModelFormat {
            line,
            reason: format!("cannot split paired feature name '{}'", name),
        }),
    }
}
