pub mod bucket_width;
pub mod decay;
pub mod gbfs;
pub mod time_range;
pub mod year_month;
