use crate::point::NO_VALUE;

/// How the raw samples of one counter reduce to a single value. Taken from
/// the last segment of the counter's dotted name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rollup {
    Average,
    Maximum,
    Minimum,
    Latest,
    Summation,
    Other,
}

impl Rollup {
    pub fn from_metric(name: &str) -> Self {
        match name.rsplit('.').next().unwrap_or_default() {
            "average" => Self::Average,
            "maximum" => Self::Maximum,
            "minimum" => Self::Minimum,
            "latest" => Self::Latest,
            "summation" => Self::Summation,
            _ => Self::Other,
        }
    }

    /// Reduce `samples` to one value. Negative samples are the source's
    /// "no data" marker; averages, maxima and minima skip them while sums also
    /// skip zeroes. [`NO_VALUE`] is returned when nothing qualifies.
    pub fn aggregate(&self, samples: &[i64]) -> i64 {
        let valid = || samples.iter().copied().filter(|v| *v >= 0);

        match self {
            Self::Average => {
                let (total, count) = valid().fold((0i128, 0i128), |(t, c), v| (t + v as i128, c + 1));
                if count == 0 {
                    return NO_VALUE;
                }
                // round half away from zero, all terms are non-negative
                ((2 * total + count) / (2 * count)) as i64
            }
            Self::Maximum => valid().max().unwrap_or(NO_VALUE),
            Self::Minimum => valid().min().unwrap_or(NO_VALUE),
            Self::Latest => samples.last().copied().unwrap_or(NO_VALUE),
            Self::Summation => {
                let total = samples
                    .iter()
                    .filter(|v| **v > 0)
                    .fold(0i128, |t, v| t + *v as i128);
                total.min(i64::MAX as i128) as i64
            }
            Self::Other => NO_VALUE,
        }
    }
}
