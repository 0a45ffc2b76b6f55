// Shared building blocks for the scoutval workspace: configuration, the
// player domain model, the relational store and the blob store collaborator.

pub mod config;
pub mod db;
pub mod model;
pub mod storage;
