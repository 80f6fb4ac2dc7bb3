pub mod view_cache;
