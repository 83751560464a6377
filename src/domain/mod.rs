pub mod dates;
pub mod day_groups;
pub mod models;
