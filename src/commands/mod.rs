pub mod cache_dir;
pub mod save;
