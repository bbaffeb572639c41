//! cnbfx Common Types
//!
//! Shared types for the cnbfx workspace: currencies and amounts, the rate
//! records published in the CNB daily fixing, and the clock used to stamp them.

pub mod monetary;
pub mod rates;
pub mod time;

pub use monetary::*;
pub use rates::*;
pub use time::*;
