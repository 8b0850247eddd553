//! Feature collections kernels bind to
//!
//! Kernels only need indexed access plus the type/class tags used to
//! validate a binding.

pub mod dummy;
pub mod sparse;
pub mod string;

pub use self::dummy::*;
pub use self::sparse::*;
pub use self::string::*;
