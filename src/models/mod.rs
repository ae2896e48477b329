pub mod market;
pub mod purchase;
pub mod result;

#[allow(unused_imports)]
pub use market::*;
#[allow(unused_imports)]
pub use purchase::*;
#[allow(unused_imports)]
pub use result::*;
