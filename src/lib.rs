#![warn(missing_docs)]

//! Hodler FC player registry: resolve player identities from the registration contract and
//! pinned profiles, index minted cards by owner, and reconcile the fantasy points feed into
//! staged card updates.
//!
//! Data flows one way: [`resolver`] → [`index`] → [`reconcile`], with [`pass`] driving a whole
//! reconciliation pass. External systems are reached only through the traits in [`interface`].

pub mod config;
pub mod error;
pub mod feed;
pub mod index;
pub mod interface;
pub mod model;
pub mod pass;
pub mod reconcile;
pub mod registration;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, ExternalError, Result};
