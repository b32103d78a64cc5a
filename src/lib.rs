//! The Token build library.
//!
//! Provides methods for compiling the Token smart contract to a deployable
//! ABI and bytecode artifact. The library primarily exists to allow the
//! integration tests to (re)build the contract artifact while testing.
pub mod compile;
