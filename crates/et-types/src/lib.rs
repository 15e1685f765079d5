pub mod errors;
pub mod fitness;
pub mod individual;
pub mod params;

pub use errors::*;
pub use fitness::*;
pub use individual::*;
pub use params::*;
