//! Sweep expansion: the cartesian product of a [`ParameterSpec`].
//!
//! Enumeration order is row-major over the parameters' insertion order: the first
//! parameter varies slowest and the last one fastest, exactly like nested
//! `for` loops written in the same order. Scalars are single-candidate
//! dimensions, so they don't change the count.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SpecError;
use crate::spec::{ParameterSpec, deserialize_ordered};

/// One concrete assignment of a value to every parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    values: Vec<(String, f64)>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut series = Self::new();
        for (name, value) in pairs {
            series.set(name, value);
        }
        series
    }

    /// Set a value, replacing any previous value for the same name.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.values.push((name, value)),
        }
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for Series {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            values: deserialize_ordered(deserializer)?,
        })
    }
}

/// The ordered series produced from a [`ParameterSpec`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    series: Vec<Series>,
}

impl Sweep {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Series> {
        self.series.iter()
    }

    pub fn into_series(self) -> Vec<Series> {
        self.series
    }
}

impl IntoIterator for Sweep {
    type Item = Series;
    type IntoIter = std::vec::IntoIter<Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_iter()
    }
}

/// Largest sweep [`expand`] will materialize
pub const MAX_SERIES: usize = 1_000_000;

/// Number of series `expand` would produce, without building them. `None`
/// if the count overflows `usize`.
pub fn total_series(spec: &ParameterSpec) -> Option<usize> {
    spec.iter()
        .try_fold(1usize, |acc, (_, v)| acc.checked_mul(v.candidates().len()))
}

/// Series count of `spec`, or an error when it exceeds [`MAX_SERIES`].
pub fn check_size(spec: &ParameterSpec) -> Result<usize, SpecError> {
    match total_series(spec) {
        Some(count) if count <= MAX_SERIES => Ok(count),
        count => Err(SpecError::TooManySeries {
            count,
            limit: MAX_SERIES,
        }),
    }
}

/// Expand a [`ParameterSpec`] into the cartesian product of its candidate values.
///
/// Parameters without any list yield exactly one series; a list of length
/// zero anywhere yields an empty sweep. Sweeps above [`MAX_SERIES`] are
/// refused before anything is allocated.
pub fn expand(spec: &ParameterSpec) -> Result<Sweep, SpecError> {
    check_size(spec)?;

    let dims: Vec<(&str, &[f64])> = spec.iter().map(|(n, v)| (n, v.candidates())).collect();
    let shape: Vec<usize> = dims.iter().map(|(_, c)| c.len()).collect();

    let series = SweepIndices::new(shape)
        .map(|indices| Series {
            values: dims
                .iter()
                .zip(&indices)
                .map(|((name, candidates), &i)| (name.to_string(), candidates[i]))
                .collect(),
        })
        .collect();

    Ok(Sweep { series })
}

/// Row-major iterator over every index tuple of a grid shape (last dimension
/// varies fastest).
#[derive(Debug, Clone)]
pub struct SweepIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl SweepIndices {
    pub fn new(shape: Vec<usize>) -> Self {
        let done = shape.contains(&0);
        Self {
            current: vec![0; shape.len()],
            shape,
            done,
        }
    }
}

impl Iterator for SweepIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        // Zero dimensions: the single empty tuple
        if self.shape.is_empty() {
            self.done = true;
            return Some(result);
        }

        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
            }
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ParamValue;

    #[test]
    fn test_indices_row_major() {
        let indices: Vec<Vec<usize>> = SweepIndices::new(vec![2, 3]).collect();
        assert_eq!(
            indices,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_indices_zero_dimensions() {
        let indices: Vec<Vec<usize>> = SweepIndices::new(vec![]).collect();
        assert_eq!(indices, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_indices_empty_dimension() {
        assert_eq!(SweepIndices::new(vec![3, 0, 2]).count(), 0);
    }

    #[test]
    fn test_series_set_replaces() {
        let mut series = Series::from_pairs([("m", 1.0), ("g", 9.8)]);
        series.set("m", 2.0);
        assert_eq!(series.get("m"), Some(2.0));
        assert_eq!(series.len(), 2);
        assert_eq!(series.to_string(), "m=2, g=9.8");
    }

    #[test]
    fn test_series_lookup_is_exact() {
        let series = Series::from_pairs([("V", 3.0)]);
        assert_eq!(series.get("v"), None);
        assert_eq!(series.get("V"), Some(3.0));
    }

    #[test]
    fn test_series_json_map() {
        let series: Series = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let names: Vec<&str> = series.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_total_matches_expand() {
        let spec = ParameterSpec::from_entries([
            ("a", ParamValue::from([1.0, 2.0, 3.0])),
            ("b", ParamValue::from(5.0)),
            ("c", ParamValue::from([7.0, 8.0])),
        ])
        .unwrap();
        assert_eq!(total_series(&spec), Some(6));
        assert_eq!(expand(&spec).unwrap().len(), 6);
    }

    fn wide_spec(params: usize, points: usize) -> ParameterSpec {
        let values: Vec<f64> = (0..points).map(|i| i as f64).collect();
        ParameterSpec::from_entries(
            (0..params).map(|i| (format!("p{i}"), ParamValue::List(values.clone()))),
        )
        .unwrap()
    }

    #[test]
    fn test_overflowing_count_is_refused() {
        let spec = wide_spec(4, 100_000);
        assert_eq!(total_series(&spec), None);
        assert_eq!(
            expand(&spec).unwrap_err(),
            SpecError::TooManySeries {
                count: None,
                limit: MAX_SERIES
            }
        );
    }

    #[test]
    fn test_oversized_sweep_is_refused() {
        let spec = wide_spec(3, 100_000);
        assert_eq!(total_series(&spec), Some(1_000_000_000_000_000));
        assert!(matches!(
            check_size(&spec),
            Err(SpecError::TooManySeries { count: Some(_), .. })
        ));

        assert_eq!(check_size(&wide_spec(2, 1000)), Ok(MAX_SERIES));
    }
}
