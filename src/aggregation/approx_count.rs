// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use super::*;
use crate::types::DataValue;
use crate::Error;

/// `approx_count(*)` over a sampled input.
///
/// Each row stands for `weight` rows of the unsampled input. The result is the VARCHAR
/// `"<estimate> +/- <error>"`, where the error bound holds with the bound confidence.
#[derive(Debug, Clone)]
pub struct ApproxCount {
    signature: Signature,
}

impl ApproxCount {
    pub fn new() -> Self {
        ApproxCount {
            signature: Signature::new(
                "approx_count",
                vec![],
                vec![
                    DataTypeKind::Int64.not_null(),
                    DataTypeKind::Int64.not_null(),
                ],
                DataTypeKind::String.not_null(),
            )
            .approximate(),
        }
    }
}

impl Default for ApproxCount {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateFunction for ApproxCount {
    type State = ApproxCountState;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn create_state(&self) -> ApproxCountState {
        ApproxCountState {
            samples: 0,
            count: 0,
        }
    }
}

pub struct ApproxCountState {
    /// Rows seen.
    samples: i64,
    /// Sum of their weights.
    count: i64,
}

impl ApproxCountState {
    fn add(&mut self, samples: i64, count: i64) -> Result<()> {
        let overflow = || Error::overflow("approx_count");
        self.samples = self.samples.checked_add(samples).ok_or_else(overflow)?;
        self.count = self.count.checked_add(count).ok_or_else(overflow)?;
        Ok(())
    }

    /// Standard error of the estimated count.
    fn standard_error(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        let samples = self.samples as f64;
        let p = samples / self.count as f64;
        // too few rows at a low sampling rate to say anything
        if p < 0.01 && self.samples < 100 {
            return f64::INFINITY;
        }
        (samples * (1.0 - p)).sqrt() / p
    }
}

impl AggregationState for ApproxCountState {
    fn update(&mut self, _args: &[&ArrayImpl], _row: usize, weight: u64) -> Result<()> {
        self.add(1, weight as i64)
    }

    fn merge(&mut self, intermediate: &[&ArrayImpl], row: usize) -> Result<()> {
        self.add(
            intermediate[0].get_i64(row).unwrap_or(0),
            intermediate[1].get_i64(row).unwrap_or(0),
        )
    }

    fn output_intermediate(&self, builders: &mut [ArrayBuilderImpl]) {
        builders[0].push(&DataValue::Int64(self.samples));
        builders[1].push(&DataValue::Int64(self.count));
    }

    fn output_final(&self, builder: &mut ArrayBuilderImpl, confidence: f64) {
        let error = self.standard_error();
        let bound = if error == 0.0 {
            0.0
        } else {
            z_score(confidence) * error
        };
        builder.push(&DataValue::String(format!(
            "{} +/- {:.0}",
            self.count,
            bound.ceil()
        )));
    }
}

/// The two-sided z-score for `confidence`, i.e. the standard normal quantile at
/// `(1 + confidence) / 2`.
pub fn z_score(confidence: f64) -> f64 {
    inverse_normal_cdf((1.0 + confidence) / 2.0)
}

/// Acklam's rational approximation of the standard normal quantile function.
///
/// Relative error is below 1.2e-9 over the whole domain.
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::aggregation::test_utils::*;

    #[test_case(0.95, 1.959964)]
    #[test_case(0.99, 2.575829)]
    #[test_case(0.5, 0.674490)]
    fn z_scores(confidence: f64, expected: f64) {
        assert!((z_score(confidence) - expected).abs() < 1e-5);
    }

    #[test]
    fn z_score_is_infinite_at_full_confidence() {
        assert!(z_score(1.0).is_infinite());
    }

    #[test]
    fn unsampled_input_is_exact() {
        let chunk = weighted_chunk(&[Some(1), Some(1), Some(1)]);
        assert_approximate_aggregation(&ApproxCount::new(), 0.95, 3.0, &[chunk]);
        let factory = ApproxCount::new().bind(vec![], None, Some(0), 0.95).unwrap();
        let mut acc = factory.create_accumulator();
        acc.add_input(&weighted_chunk(&[Some(1), Some(1)])).unwrap();
        assert_eq!(acc.evaluate_final().get_str(0), Some("2 +/- 0"));
    }

    #[test]
    fn sampled_input_within_bound() {
        // ten rows sampled at 50%
        let chunks = [
            weighted_chunk(&[Some(2); 6]),
            weighted_chunk(&[]),
            weighted_chunk(&[Some(2), None, Some(2), Some(2), Some(0), Some(2)]),
        ];
        assert_approximate_aggregation(&ApproxCount::new(), 0.95, 20.0, &chunks);
        assert_approximate_aggregation(&ApproxCount::new(), 0.95, 24.0, &chunks);
    }

    #[test]
    fn tiny_sample_has_infinite_error() {
        let factory = ApproxCount::new().bind(vec![], None, Some(0), 0.95).unwrap();
        let mut acc = factory.create_accumulator();
        acc.add_input(&weighted_chunk(&[Some(1000)])).unwrap();
        assert_eq!(acc.evaluate_final().get_str(0), Some("1000 +/- inf"));
    }
}
