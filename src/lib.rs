pub mod accumulate;
pub mod cache;
pub mod enrich;
pub mod extract;
pub mod family;
pub mod fetch;
pub mod model;
pub mod output;
pub mod scoring;
pub mod seasons;
pub mod tags;
