pub mod emergency;
pub mod features;

pub use emergency::*;
pub use features::*;
