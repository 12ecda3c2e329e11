pub mod domain;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod steps;

pub use error::FilterError;
pub use filter::{
    BooleanFilter, BooleanFilterValue, Filter, FilterValue, FilterWithValue, MultipleChoiceFilter,
    MultipleChoiceFilterValue, SliderFilter, SliderFilterValue, SliderMapping,
};
pub use steps::PowerStepMap;
