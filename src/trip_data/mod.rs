pub mod error;
pub mod loader;
pub mod trip_data;
