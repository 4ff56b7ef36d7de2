pub mod backfill;
pub mod refresh;
pub mod summary;
pub mod ui;
