use std::collections::BTreeSet;

use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

use crate::{domain::ValueKind, error::FilterError, steps::PowerStepMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliderMapping {
    /// Step index is the domain value, e.g. a raw connector count.
    Identity,
    PowerSteps(PowerStepMap),
}

impl SliderMapping {
    pub fn map(&self, step: u32) -> i64 {
        match self {
            SliderMapping::Identity => i64::from(step),
            SliderMapping::PowerSteps(steps) => steps.mapping(step),
        }
    }

    /// Nearest step for `value`, clamped into `0..=max`.
    pub fn inverse(&self, value: i64, max: u32) -> u32 {
        let step = match self {
            SliderMapping::Identity => value.clamp(0, i64::from(max)) as u32,
            SliderMapping::PowerSteps(steps) => steps.inverse_mapping(value),
        };
        step.min(max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanFilter {
    pub name: String,
    pub key: String,
}

impl BooleanFilter {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn default_value(&self) -> BooleanFilterValue {
        BooleanFilterValue {
            key: self.key.clone(),
            value: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultipleChoiceFilter {
    pub name: String,
    pub key: String,
    /// Option id to display label, in catalog order.
    pub choices: IndexMap<String, String>,
    /// Ids the UI may surface first; no effect on filtering.
    pub common_choices: Option<BTreeSet<String>>,
}

// Option order is part of the definition; `IndexMap` equality ignores it.
impl PartialEq for MultipleChoiceFilter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.key == other.key
            && self.choices.iter().eq(other.choices.iter())
            && self.common_choices == other.common_choices
    }
}

impl Eq for MultipleChoiceFilter {}

impl MultipleChoiceFilter {
    pub fn default_value(&self) -> MultipleChoiceFilterValue {
        MultipleChoiceFilterValue {
            key: self.key.clone(),
            values: BTreeSet::new(),
            all: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliderFilter {
    pub name: String,
    pub key: String,
    /// Inclusive upper bound of the step index.
    pub max: u32,
    pub mapping: SliderMapping,
    pub unit: Option<String>,
}

impl SliderFilter {
    /// Slider over raw counts `0..=max`.
    pub fn counting(name: impl Into<String>, key: impl Into<String>, max: u32) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            max,
            mapping: SliderMapping::Identity,
            unit: None,
        }
    }

    pub fn stepped(
        name: impl Into<String>,
        key: impl Into<String>,
        steps: PowerStepMap,
        unit: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            max: steps.max_index(),
            mapping: SliderMapping::PowerSteps(steps),
            unit,
        }
    }

    pub fn mapping(&self, step: u32) -> i64 {
        self.mapping.map(step.min(self.max))
    }

    pub fn inverse_mapping(&self, value: i64) -> u32 {
        self.mapping.inverse(value, self.max)
    }

    pub fn default_value(&self) -> SliderFilterValue {
        SliderFilterValue {
            key: self.key.clone(),
            value: 0,
        }
    }
}

/// Definition of one adjustable search criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Boolean(BooleanFilter),
    MultipleChoice(MultipleChoiceFilter),
    Slider(SliderFilter),
}

impl Filter {
    pub fn name(&self) -> &str {
        match self {
            Filter::Boolean(f) => &f.name,
            Filter::MultipleChoice(f) => &f.name,
            Filter::Slider(f) => &f.name,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Filter::Boolean(f) => &f.key,
            Filter::MultipleChoice(f) => &f.key,
            Filter::Slider(f) => &f.key,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            Filter::Boolean(_) => ValueKind::Boolean,
            Filter::MultipleChoice(_) => ValueKind::MultipleChoice,
            Filter::Slider(_) => ValueKind::Slider,
        }
    }

    pub fn default_value(&self) -> FilterValue {
        match self {
            Filter::Boolean(f) => FilterValue::Boolean(f.default_value()),
            Filter::MultipleChoice(f) => FilterValue::MultipleChoice(f.default_value()),
            Filter::Slider(f) => FilterValue::Slider(f.default_value()),
        }
    }
}

impl From<BooleanFilter> for Filter {
    fn from(filter: BooleanFilter) -> Self {
        Filter::Boolean(filter)
    }
}

impl From<MultipleChoiceFilter> for Filter {
    fn from(filter: MultipleChoiceFilter) -> Self {
        Filter::MultipleChoice(filter)
    }
}

impl From<SliderFilter> for Filter {
    fn from(filter: SliderFilter) -> Self {
        Filter::Slider(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanFilterValue {
    pub key: String,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoiceFilterValue {
    pub key: String,
    #[serde(default)]
    pub values: BTreeSet<String>,
    /// No restriction; takes precedence over `values` when set.
    pub all: bool,
}

impl MultipleChoiceFilterValue {
    pub fn allows(&self, id: &str) -> bool {
        self.all || self.values.contains(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderFilterValue {
    pub key: String,
    /// Step index, not a domain value.
    pub value: u32,
}

/// Current setting of one filter, keyed by the filter's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterValue {
    Boolean(BooleanFilterValue),
    MultipleChoice(MultipleChoiceFilterValue),
    Slider(SliderFilterValue),
}

impl FilterValue {
    pub fn key(&self) -> &str {
        match self {
            FilterValue::Boolean(v) => &v.key,
            FilterValue::MultipleChoice(v) => &v.key,
            FilterValue::Slider(v) => &v.key,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FilterValue::Boolean(_) => ValueKind::Boolean,
            FilterValue::MultipleChoice(_) => ValueKind::MultipleChoice,
            FilterValue::Slider(_) => ValueKind::Slider,
        }
    }
}

impl From<BooleanFilterValue> for FilterValue {
    fn from(value: BooleanFilterValue) -> Self {
        FilterValue::Boolean(value)
    }
}

impl From<MultipleChoiceFilterValue> for FilterValue {
    fn from(value: MultipleChoiceFilterValue) -> Self {
        FilterValue::MultipleChoice(value)
    }
}

impl From<SliderFilterValue> for FilterValue {
    fn from(value: SliderFilterValue) -> Self {
        FilterValue::Slider(value)
    }
}

/// A filter paired with a value of the matching variant.
///
/// The pairing is only constructible through [`FilterWithValue::pair`], so a
/// boolean filter can never carry a slider value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterWithValue {
    Boolean {
        filter: BooleanFilter,
        value: BooleanFilterValue,
    },
    MultipleChoice {
        filter: MultipleChoiceFilter,
        value: MultipleChoiceFilterValue,
    },
    Slider {
        filter: SliderFilter,
        value: SliderFilterValue,
    },
}

impl FilterWithValue {
    pub fn pair(filter: Filter, value: FilterValue) -> Result<Self, FilterError> {
        match (filter, value) {
            (Filter::Boolean(filter), FilterValue::Boolean(value)) => {
                Ok(FilterWithValue::Boolean { filter, value })
            }
            (Filter::MultipleChoice(filter), FilterValue::MultipleChoice(value)) => {
                Ok(FilterWithValue::MultipleChoice { filter, value })
            }
            (Filter::Slider(filter), FilterValue::Slider(value)) => {
                Ok(FilterWithValue::Slider { filter, value })
            }
            (filter, value) => Err(FilterError::ValueKindMismatch {
                key: filter.key().to_string(),
                expected: filter.value_kind(),
                found: value.kind(),
            }),
        }
    }

    pub fn with_default(filter: Filter) -> Self {
        match filter {
            Filter::Boolean(filter) => FilterWithValue::Boolean {
                value: filter.default_value(),
                filter,
            },
            Filter::MultipleChoice(filter) => FilterWithValue::MultipleChoice {
                value: filter.default_value(),
                filter,
            },
            Filter::Slider(filter) => FilterWithValue::Slider {
                value: filter.default_value(),
                filter,
            },
        }
    }

    pub fn key(&self) -> &str {
        match self {
            FilterWithValue::Boolean { filter, .. } => &filter.key,
            FilterWithValue::MultipleChoice { filter, .. } => &filter.key,
            FilterWithValue::Slider { filter, .. } => &filter.key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FilterWithValue::Boolean { filter, .. } => &filter.name,
            FilterWithValue::MultipleChoice { filter, .. } => &filter.name,
            FilterWithValue::Slider { filter, .. } => &filter.name,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FilterWithValue::Boolean { .. } => ValueKind::Boolean,
            FilterWithValue::MultipleChoice { .. } => ValueKind::MultipleChoice,
            FilterWithValue::Slider { .. } => ValueKind::Slider,
        }
    }

    pub fn filter(&self) -> Filter {
        match self {
            FilterWithValue::Boolean { filter, .. } => Filter::Boolean(filter.clone()),
            FilterWithValue::MultipleChoice { filter, .. } => {
                Filter::MultipleChoice(filter.clone())
            }
            FilterWithValue::Slider { filter, .. } => Filter::Slider(filter.clone()),
        }
    }

    pub fn value(&self) -> FilterValue {
        match self {
            FilterWithValue::Boolean { value, .. } => FilterValue::Boolean(value.clone()),
            FilterWithValue::MultipleChoice { value, .. } => {
                FilterValue::MultipleChoice(value.clone())
            }
            FilterWithValue::Slider { value, .. } => FilterValue::Slider(value.clone()),
        }
    }

    /// Same filter, new value. The value must carry this entry's key.
    pub fn with_value(&self, value: FilterValue) -> Result<Self, FilterError> {
        if value.key() != self.key() {
            return Err(FilterError::UnknownFilter {
                key: value.key().to_string(),
            });
        }
        Self::pair(self.filter(), value)
    }
}
