// HTTP surface: the CSV import endpoint plus player, statistics and
// prediction routes, all behind a permissive CORS layer.

pub mod app;
pub mod cors;
pub mod error;
pub mod import;
pub mod routes;
