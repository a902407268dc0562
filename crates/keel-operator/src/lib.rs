//! Keel operator: manages the platform components of a Keel installation

#![deny(missing_docs)]

/// Command-line configuration
pub mod cli;
/// Component controller construction
pub mod controller_runner;
/// Priority component gate backed by the status service
pub mod gate;
/// Startup utilities (CRD install, status reporting)
pub mod startup;

#[cfg(test)]
mod test_support;
