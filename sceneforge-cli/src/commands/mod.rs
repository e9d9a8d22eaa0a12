pub mod clean;
pub mod export;
pub mod scan;
