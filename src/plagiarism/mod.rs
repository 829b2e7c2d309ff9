//! Structural plagiarism detection for Python submissions
//!
//! source → [`python`] AST → [`cfg`] → [`pdg`] (hashed by [`canonical`])
//! → [`similarity`] → [`report`]

pub mod canonical;
pub mod cfg;
pub mod pdg;
pub mod python;
pub mod report;
pub mod similarity;

pub use pdg::{build_pdg, EdgeKind, Pdg, PdgEdge, PdgNode};
pub use report::SimilarityReport;
pub use similarity::{compare, Similarity};
