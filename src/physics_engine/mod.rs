//! Physics Constraint Module
//!
//! Deterministic meteorological consistency rules applied to an enhanced
//! variable set against the original forecast. All rules here are pure
//! physics/bookkeeping, no learned components.
//!
//! ## Rules (applied in order)
//! 1. Valid physical ranges (precipitation ≥ 0; humidity and cloud in [0, 100])
//! 2. Temperature–humidity coupling
//! 3. Precipitation–cloud coupling
//! 4. Change-magnitude limiting against the original, always last

mod constraints;

pub use constraints::PhysicsConstraintEngine;
