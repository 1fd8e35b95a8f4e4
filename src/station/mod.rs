pub mod bucketing;
pub mod station;
