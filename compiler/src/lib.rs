//! Clay Analyzer: value/type inference for the Clay language front end.
//!
//! # Analysis Pipeline
//!
//! ```text
//! AST (from an external parser)
//!     │
//!     ▼
//! ┌──────────┐
//! │  Binder   │  One pass over top-level items, populating the scope chain
//! └────┬─────┘
//!      │
//!      ▼
//! ┌──────────┐
//! │  Module   │  Top-level scope; inference runs on demand from here
//! └────┬─────┘
//!      │
//!      ▼
//! ┌──────────┐
//! │  Infer    │  Value/type duality, named call & index dispatch,
//! │           │  unification-based instantiation, return-type cache
//! └────┬─────┘
//!      │
//!      ▼
//! InferenceResult { is_value, ty }
//! ```

pub mod ast;
pub mod binder;
pub mod entity;
pub mod env;
pub mod errors;
pub mod infer;
pub mod span;
pub mod types;

pub use binder::{analyze, Module};
pub use errors::{CompileError, InferError};
pub use infer::InferenceResult;
