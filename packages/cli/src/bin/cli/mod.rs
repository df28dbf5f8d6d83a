pub mod backfill;
pub mod documents;
pub mod signing;
pub mod status;
pub mod utils;
