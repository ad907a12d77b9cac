//! Profiles of the chips this crate has been brought up on.
//!
//! Each profile is a `const` value. A chip not listed here can be described
//! by building a [crate::ChipProfile] the same way.
mod everspin;
mod infineon;
mod micron;
mod st;
mod winbond;

pub use everspin::MR25H40;
pub use infineon::CY15B108QN;
pub use micron::MT25TL01G;
pub use st::M95M02;
pub use winbond::{W25N01GV, W25N512G};
