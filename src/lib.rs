//! GitHub Trending digest publisher.
//!
//! A run fetches a trending listing ([`trending`]), enriches every repository
//! through the GitHub REST API ([`enrich`]), renders an article
//! ([`article`]) and fans it out to the configured destinations
//! ([`publish`]). [`pipeline::Pipeline`] wires the stages together.

pub mod alert;
pub mod article;
pub mod config;
pub mod enrich;
pub mod pipeline;
pub mod publish;
pub mod trending;
pub mod util;
