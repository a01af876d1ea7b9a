//! In-memory GenICam node map.

use daq_core::{DaqError, DaqResult, ParameterRange};
use daq_driver_genicam::features as f;
use daq_driver_genicam::FeatureValue;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub value: FeatureValue,
    pub range: Option<ParameterRange>,
}

impl Feature {
    fn int(value: i64, min: i64, max: i64) -> Self {
        Self {
            value: FeatureValue::Int(value),
            range: Some(ParameterRange::new(min as f64, max as f64)),
        }
    }

    fn float(value: f64, min: f64, max: f64) -> Self {
        Self {
            value: FeatureValue::Float(value),
            range: Some(ParameterRange::new(min, max)),
        }
    }

    fn read_only_int(value: i64) -> Self {
        Self {
            value: FeatureValue::Int(value),
            range: None,
        }
    }

    fn enumeration(entry: &str) -> Self {
        Self {
            value: FeatureValue::Enum(entry.to_string()),
            range: None,
        }
    }
}

/// Named features plus command features of one simulated camera.
#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    features: BTreeMap<String, Feature>,
    commands: BTreeSet<String>,
    /// Writes to these features fail with a device error.
    faulty: BTreeSet<String>,
}

impl NodeMap {
    /// Node map of a Mono12 GigE camera with binning, `*Abs` register names
    /// and a throughput limit.
    pub fn gige(sensor_rows: u32, sensor_cols: u32) -> Self {
        let rows = i64::from(sensor_rows);
        let cols = i64::from(sensor_cols);
        let mut map = Self::default();
        map.insert(f::SENSOR_HEIGHT, Feature::read_only_int(rows));
        map.insert(f::SENSOR_WIDTH, Feature::read_only_int(cols));
        map.insert(f::SENSOR_BITS, Feature::read_only_int(12));
        map.insert(f::HEIGHT, Feature::int(rows, 1, rows));
        map.insert(f::WIDTH, Feature::int(cols, 1, cols));
        map.insert(f::OFFSET_X, Feature::int(0, 0, cols - 1));
        map.insert(f::OFFSET_Y, Feature::int(0, 0, rows - 1));
        map.insert(f::BINNING_HORIZONTAL, Feature::int(1, 1, 8));
        map.insert(f::BINNING_VERTICAL, Feature::int(1, 1, 8));
        map.insert(f::EXPOSURE_TIME[0], Feature::float(1000.0, 10.0, 1_000_000.0));
        map.insert(f::ACQUISITION_FRAME_RATE[0], Feature::float(100.0, 1.0, 250.0));
        map.insert(
            f::ACQUISITION_FRAME_RATE_LIMIT,
            Feature {
                value: FeatureValue::Float(200.0),
                range: None,
            },
        );
        map.insert(
            f::STREAM_THROUGHPUT[0],
            Feature::int(124_000_000, 1_000_000, 124_000_000),
        );
        map.insert(f::GVSP_PACKET_SIZE, Feature::int(576, 576, 9000));
        map.insert(f::PIXEL_FORMAT, Feature::enumeration("Mono8"));
        map.insert(f::TRIGGER_SELECTOR, Feature::enumeration("AcquisitionStart"));
        map.insert(f::TRIGGER_SOURCE, Feature::enumeration("Freerun"));
        map.insert(f::ACQUISITION_MODE, Feature::enumeration("SingleFrame"));
        map.insert(f::SYNC_OUT_SELECTOR, Feature::enumeration("SyncOut1"));
        map.insert(f::SYNC_OUT_SOURCE, Feature::enumeration("GPO"));
        map.add_command(f::GVSP_ADJUST_PACKET_SIZE);
        map
    }

    pub fn insert(&mut self, name: &str, feature: Feature) {
        self.features.insert(name.to_string(), feature);
    }

    pub fn remove(&mut self, name: &str) -> Option<Feature> {
        self.features.remove(name)
    }

    /// Move a feature to a new name, keeping value and range.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(feature) = self.features.remove(from) {
            self.features.insert(to.to_string(), feature);
        }
    }

    pub fn add_command(&mut self, name: &str) {
        self.commands.insert(name.to_string());
    }

    pub fn fail_writes_to(&mut self, name: &str) {
        self.faulty.insert(name.to_string());
    }

    pub fn clear_faults(&mut self) {
        self.faulty.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name) || self.commands.contains(name)
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> DaqResult<FeatureValue> {
        self.features
            .get(name)
            .map(|feature| feature.value.clone())
            .ok_or_else(|| DaqError::UnsupportedControl(name.to_string()))
    }

    pub fn range(&self, name: &str) -> DaqResult<Option<ParameterRange>> {
        self.features
            .get(name)
            .map(|feature| feature.range)
            .ok_or_else(|| DaqError::UnsupportedControl(name.to_string()))
    }

    pub fn set(&mut self, name: &str, value: FeatureValue) -> DaqResult<()> {
        if self.faulty.contains(name) {
            return Err(DaqError::Device(format!("simulated write failure on {name}")));
        }
        let feature = self
            .features
            .get_mut(name)
            .ok_or_else(|| DaqError::UnsupportedControl(name.to_string()))?;

        let value = match (&feature.value, value) {
            (FeatureValue::Enum(_), FeatureValue::Enum(entry)) => FeatureValue::Enum(entry),
            (FeatureValue::Enum(_), other) | (_, other @ FeatureValue::Enum(_)) => {
                return Err(DaqError::Device(format!(
                    "type mismatch writing {other:?} to {name}"
                )));
            }
            (current, other) => {
                let numeric = other.as_f64().unwrap_or_default();
                if let Some(range) = feature.range {
                    range.check(name, numeric)?;
                }
                current.numeric_like(numeric).unwrap_or(other)
            }
        };
        feature.value = value;
        Ok(())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.features.get(name)?.value {
            FeatureValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.features.get(name)?.value.as_f64()
    }

    /// Current readout `(rows, cols)`.
    pub fn readout(&self) -> (u32, u32) {
        let rows = self.int(f::HEIGHT).unwrap_or(1).max(1) as u32;
        let cols = self.int(f::WIDTH).unwrap_or(1).max(1) as u32;
        (rows, cols)
    }

    /// Configured frame rate, under whichever register name is present.
    pub fn frame_rate(&self) -> f64 {
        f::ACQUISITION_FRAME_RATE
            .iter()
            .find_map(|name| self.float(name))
            .unwrap_or(10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_enforced() {
        let mut map = NodeMap::gige(48, 64);
        let err = map
            .set(f::BINNING_HORIZONTAL, FeatureValue::Int(16))
            .unwrap_err();
        assert!(matches!(err, DaqError::ParameterOutOfRange { .. }));
        assert_eq!(map.int(f::BINNING_HORIZONTAL), Some(1));
    }

    #[test]
    fn test_numeric_kind_preserved() {
        let mut map = NodeMap::gige(48, 64);
        map.set(f::HEIGHT, FeatureValue::Float(24.0)).unwrap();
        assert_eq!(map.get(f::HEIGHT).unwrap(), FeatureValue::Int(24));
    }

    #[test]
    fn test_unknown_feature() {
        let map = NodeMap::gige(48, 64);
        assert_eq!(
            map.get("DeviceLinkThroughputLimit"),
            Err(DaqError::UnsupportedControl(
                "DeviceLinkThroughputLimit".into()
            ))
        );
    }

    #[test]
    fn test_rename_and_faults() {
        let mut map = NodeMap::gige(48, 64);
        map.rename("ExposureTimeAbs", "ExposureTime");
        assert!(!map.contains("ExposureTimeAbs"));
        assert_eq!(map.float("ExposureTime"), Some(1000.0));

        map.fail_writes_to(f::WIDTH);
        assert!(matches!(
            map.set(f::WIDTH, FeatureValue::Int(32)),
            Err(DaqError::Device(_))
        ));
        map.clear_faults();
        assert!(map.set(f::WIDTH, FeatureValue::Int(32)).is_ok());
    }
}
