/// Redis-backed caches
pub mod profile_cache;

pub use profile_cache::ProfileCache;
