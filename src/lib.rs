//! Heuristic matching of classes, methods, fields and variables between two
//! builds of the same JVM program.

pub mod cache;
pub mod cfg;
pub mod classfile;
pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod env;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod matches_io;
pub mod model;
pub mod progress;
pub mod render;
pub mod scan;

pub use classifier::ClassifierSet;
pub use config::{MatcherConfig, ProjectConfig};
pub use env::ClassEnvironment;
pub use error::MatchError;
pub use matcher::Matcher;
