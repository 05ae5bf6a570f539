use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocols::esr31::{FieldMap, Measurement, RejectReason};

/// Why an acquisition run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The attempt budget was used up.
    BudgetExhausted,
    /// The configured stop condition was satisfied.
    ConditionMet,
    /// The line source reported that no further lines will arrive.
    EndOfStream,
}

/// Latest value per field name plus attempt accounting for one run.
///
/// Invariant: `attempts == accepted + rejected`, and `no_data` is the subset
/// of `rejected` where nothing arrived at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionResult {
    measurements: BTreeMap<String, Measurement>,
    rejections: BTreeMap<RejectReason, u64>,
    attempts: u64,
    accepted: u64,
    rejected: u64,
    no_data: u64,
    stop_reason: Option<StopReason>,
}

impl AcquisitionResult {
    pub fn measurements(&self) -> &BTreeMap<String, Measurement> {
        &self.measurements
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.measurements.get(name)
    }

    pub fn rejections(&self) -> &BTreeMap<RejectReason, u64> {
        &self.rejections
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn no_data(&self) -> u64 {
        self.no_data
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// True once every field of `map` has a value.
    pub fn covers(&self, map: &FieldMap) -> bool {
        map.names().all(|name| self.measurements.contains_key(name))
    }

    pub(crate) fn record_frame(&mut self, measurements: Vec<Measurement>) {
        self.attempts += 1;
        self.accepted += 1;
        for measurement in measurements {
            self.measurements
                .insert(measurement.name.clone(), measurement);
        }
    }

    pub(crate) fn record_rejection(&mut self, reason: RejectReason) {
        self.attempts += 1;
        self.rejected += 1;
        if reason == RejectReason::NoData {
            self.no_data += 1;
        }
        *self.rejections.entry(reason).or_default() += 1;
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }
}
