//! Second-order optimizers for smooth objectives
//!
//! [newton_cg] is the entry point. [cg_solve] and [backtracking] are its building blocks and may
//! be used on their own.

pub mod cg;
pub mod line_search;
pub mod newton_cg;

pub use cg::{cg_solve, CgOptions, CgOutcome, CgScratch, CgTermination};
pub use line_search::{backtracking, LineSearchOptions, LineSearchOutcome};
pub use newton_cg::{newton_cg, solve, NewtonCgOptions, NewtonCgOutcome, Status, Workspace};
