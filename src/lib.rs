//! Layered trait configuration and the trait pipeline for integrations
//!
//! An integration document (platform, kit and integration sections) is
//! resolved into one configuration per trait, then every trait of the
//! [`traits::Catalog`] is configured and applied in order, producing the
//! cluster resources that run the integration.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod traits;
pub mod translate;
