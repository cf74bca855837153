pub mod aggregate;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod normalize;
pub mod output;
pub mod parse;
pub mod providers;
pub mod schema;

pub use error::NormalizeError;
pub use normalize::normalize;
