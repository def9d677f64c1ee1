//! Per-zone statistics of raster values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregated raster values of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
}

impl ZoneStatistics {
    fn from_first_value(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            mean: value,
            count: 1,
        }
    }

    fn add_value(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }
}

/// Zone identifier → statistics, ordered by zone identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    zones: BTreeMap<i64, ZoneStatistics>,
}

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, zone: i64, statistics: ZoneStatistics) -> Option<ZoneStatistics> {
        self.zones.insert(zone, statistics)
    }

    pub fn get(&self, zone: i64) -> Option<&ZoneStatistics> {
        self.zones.get(&zone)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &ZoneStatistics)> {
        self.zones.iter().map(|(zone, statistics)| (*zone, statistics))
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.zones.keys().copied()
    }

    /// Drops a zone, e.g. the group of no-data cells.
    #[must_use]
    pub fn without_zone(mut self, zone: i64) -> Self {
        self.zones.remove(&zone);
        self
    }
}

impl FromIterator<(i64, ZoneStatistics)> for AggregateResult {
    fn from_iter<T: IntoIterator<Item = (i64, ZoneStatistics)>>(iter: T) -> Self {
        Self {
            zones: iter.into_iter().collect(),
        }
    }
}

/// Computes [`ZoneStatistics`] locally, one value at a time.
///
/// The mean is updated incrementally so that large zones do not accumulate huge sums.
#[derive(Debug, Clone, Default)]
pub struct ZoneStatisticsAggregator {
    zones: BTreeMap<i64, ZoneStatistics>,
}

impl ZoneStatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raster value to a zone. NaN values count as missing and are ignored.
    pub fn add_value(&mut self, zone: i64, value: f64) {
        if value.is_nan() {
            return;
        }

        self.zones
            .entry(zone)
            .and_modify(|statistics| statistics.add_value(value))
            .or_insert_with(|| ZoneStatistics::from_first_value(value));
    }

    pub fn into_result(self) -> AggregateResult {
        AggregateResult { zones: self.zones }
    }
}
