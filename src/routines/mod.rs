// Labelled datasets and synthetic data
pub mod data;
// Vector primitives
pub mod linalg;
// Routines for logging
pub mod logger;
// Scalar helpers
pub mod math;
// Objective functions
pub mod objective;
// Newton-CG and its building blocks
pub mod optimization;
// Routines for settings
pub mod settings;
