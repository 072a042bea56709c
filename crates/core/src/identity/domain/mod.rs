pub mod person_registry;
pub mod persona;
pub mod track_deduplicator;
