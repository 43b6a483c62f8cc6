pub mod policy;
pub mod token;

pub use policy::{authorize, Policy};
pub use token::{Claims, TokenService};
