//! Shared entities and wire types for the fog-compute deployment control
//! plane. This crate carries no business logic — it is the contract
//! between `fog_core` and anything that talks to it over HTTP.

pub mod api;
pub mod entities;
