pub mod doubles;
pub mod wait;

#[allow(unused_imports)]
pub use doubles::*;
#[allow(unused_imports)]
pub use wait::*;
