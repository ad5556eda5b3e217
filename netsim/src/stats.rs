// NetSim: Packet-level network simulator and graph toolkit written in Rust
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Basic statistics over series of numbers.

use ordered_float::OrderedFloat;

/// Running summary statistics about a series of numbers.
///
/// Minimum and maximum are seeded from the first added value.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    sum: f64,
    count: usize,
    sum_squared: f64,
    min: f64,
    max: f64,
}

impl SummaryStats {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the summary.
    ///
    /// # Panics
    /// Panics when the value is large enough to overflow the sum of
    /// squares.
    pub fn add(&mut self, value: f64) {
        assert!(
            value.abs() < f64::MAX.sqrt(),
            "value too large: {value}"
        );
        let value_squared = value * value;
        assert!(
            f64::MAX - self.sum_squared.abs() > value_squared,
            "sum of squares overflows"
        );

        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        self.sum += value;
        self.sum_squared += value_squared;
    }

    /// Number of values added so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Sum of the squares of all values.
    pub fn sum_squared(&self) -> f64 {
        self.sum_squared
    }

    /// Mean of the values. Panics with no values.
    pub fn mean(&self) -> f64 {
        assert!(self.count > 0, "no values yet");
        self.sum / self.count as f64
    }

    /// Population variance of the values. Panics with no values.
    pub fn var(&self) -> f64 {
        let mean = self.mean();
        self.sum_squared / self.count as f64 - mean * mean
    }

    /// Standard deviation of the values. Panics with no values.
    pub fn std(&self) -> f64 {
        self.var().sqrt()
    }

    /// Smallest value seen. Panics with no values.
    pub fn min(&self) -> f64 {
        assert!(self.count > 0, "no values yet");
        self.min
    }

    /// Largest value seen. Panics with no values.
    pub fn max(&self) -> f64 {
        assert!(self.count > 0, "no values yet");
        self.max
    }

    /// Reset to the empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reset the internal state to the given values.
    pub fn reset_to(&mut self, count: usize, sum: f64, sum_squared: f64, min: f64, max: f64) {
        *self = Self {
            sum,
            count,
            sum_squared,
            min,
            max,
        };
    }
}

/// Returns a vector with `n + 1` values, the i-th of which is the i-th
/// n-quantile of the input (the first element is the minimum, the last the
/// maximum). Sorts the input; returns an empty vector for empty input.
pub fn percentiles<T: Ord + Clone>(values: &mut [T], n: usize) -> Vec<T> {
    percentiles_by(values, n, |a, b| a.cmp(b))
}

/// Like [`percentiles`], but with a custom comparator.
pub fn percentiles_by<T: Clone, F>(values: &mut [T], n: usize, compare: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> std::cmp::Ordering,
{
    if values.is_empty() {
        return Vec::new();
    }
    values.sort_by(compare);
    let max_index = (values.len() - 1) as f64;
    (0..=n)
        .map(|p| {
            let index = (0.5 + max_index * (p as f64 / n as f64)) as usize;
            values[index].clone()
        })
        .collect()
}

/// Like [`percentiles`], for floating-point values.
pub fn percentiles_f64(values: &mut [f64], n: usize) -> Vec<f64> {
    percentiles_by(values, n, |a, b| OrderedFloat(*a).cmp(&OrderedFloat(*b)))
}

/// Returns a vector with `n + 1` values; the i-th value is the fraction of
/// the total sum accumulated by the values up to the i-th n-quantile. Sorts
/// the input; returns an empty vector for empty input.
pub fn cumulative_fractions(values: &mut [f64], n: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    values.sort_by(|a, b| OrderedFloat(*a).cmp(&OrderedFloat(*b)));
    let total: f64 = values.iter().sum();

    let mut sums = Vec::with_capacity(values.len());
    let mut so_far = 0.0;
    for value in values.iter() {
        so_far += value;
        sums.push(so_far / total);
    }

    let max_index = (values.len() - 1) as f64;
    (0..=n)
        .map(|p| {
            let index = (0.5 + max_index * (p as f64 / n as f64)) as usize;
            sums[index]
        })
        .collect()
}

/// Bins a series of (x, y) points: each `bin_size` consecutive points are
/// replaced by a single point whose x is the first x of the bin and whose y
/// is the mean of the bin's y values.
pub fn bin(bin_size: usize, data: &mut Vec<(f64, f64)>) {
    assert!(bin_size != 0, "bin size must be positive");
    if bin_size == 1 || data.is_empty() {
        return;
    }

    let mut out_index = 0;
    let mut bin_total = 0.0;
    for i in 0..data.len() {
        if i != 0 && i % bin_size == 0 {
            let mean = bin_total / bin_size as f64;
            let bin_start = data[i - bin_size].0;
            data[out_index] = (bin_start, mean);
            out_index += 1;
            bin_total = 0.0;
        }
        bin_total += data[i].1;
    }

    let remainder = data.len() % bin_size;
    if remainder != 0 {
        let base = (data.len() / bin_size) * bin_size;
        let mean = bin_total / remainder as f64;
        data[out_index] = (data[base].0, mean);
        out_index += 1;
    }
    data.truncate(out_index);
}
