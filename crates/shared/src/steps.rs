use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Charging power steps in kW offered by the minimum-power slider.
pub const CHARGING_POWER_STEPS: [i64; 14] =
    [0, 2, 3, 7, 11, 22, 43, 50, 100, 150, 200, 250, 300, 350];

/// Ordered table of representative domain values addressed by a step index.
///
/// The table is strictly increasing but not evenly spaced, so a slider over it
/// moves in "useful" increments instead of linear ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct PowerStepMap {
    steps: Vec<i64>,
}

impl PowerStepMap {
    pub fn new(steps: Vec<i64>) -> Result<Self, FilterError> {
        if steps.is_empty() {
            return Err(FilterError::EmptySteps);
        }
        if let Some(pair) = steps.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(FilterError::UnorderedSteps {
                previous: pair[0],
                next: pair[1],
            });
        }
        Ok(Self { steps })
    }

    pub fn charging_power() -> Self {
        Self {
            steps: CHARGING_POWER_STEPS.to_vec(),
        }
    }

    pub fn steps(&self) -> &[i64] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Largest valid step index, suitable as a slider's `max`.
    pub fn max_index(&self) -> u32 {
        (self.steps.len() - 1) as u32
    }

    /// Domain value at `index`.
    ///
    /// An out-of-range index is a caller bug: debug builds panic, release
    /// builds clamp to the last step. Use [`PowerStepMap::try_mapping`] to
    /// get an error instead.
    pub fn mapping(&self, index: u32) -> i64 {
        debug_assert!(
            (index as usize) < self.steps.len(),
            "step index {index} out of range for {} steps",
            self.steps.len()
        );
        let last = self.steps.len() - 1;
        self.steps[(index as usize).min(last)]
    }

    pub fn try_mapping(&self, index: u32) -> Result<i64, FilterError> {
        self.steps
            .get(index as usize)
            .copied()
            .ok_or(FilterError::StepOutOfRange {
                index,
                len: self.steps.len(),
            })
    }

    /// Index of the step closest to `value`; ties go to the smaller index.
    ///
    /// Total over all integers: values beyond either end of the table land
    /// on the nearest boundary index.
    pub fn inverse_mapping(&self, value: i64) -> u32 {
        self.steps
            .iter()
            .enumerate()
            .min_by_key(|(_, step)| step.abs_diff(value))
            .map(|(index, _)| index as u32)
            .unwrap_or_default()
    }
}

impl Default for PowerStepMap {
    fn default() -> Self {
        Self::charging_power()
    }
}

impl TryFrom<Vec<i64>> for PowerStepMap {
    type Error = FilterError;

    fn try_from(steps: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<PowerStepMap> for Vec<i64> {
    fn from(map: PowerStepMap) -> Self {
        map.steps
    }
}
