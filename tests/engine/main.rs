//! Integration suite for the record store engine.

mod common;

mod groups;
mod identity;
mod lifecycle;
mod schema;
