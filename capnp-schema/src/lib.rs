//! A front end for Cap'n Proto style schema files.
//!
//! Schemas are processed in two phases. [`parse`] turns source text into a
//! [`syntax::Module`], with every name left exactly as written. [`resolve`]
//! then loads everything the module imports and binds its names, producing a
//! linked [`Schema`].

pub mod driver;
pub mod linked;
pub mod literal;
pub mod reporting;
pub mod resolve;
pub mod source;
pub mod syntax;

pub use crate::driver::{Driver, Status};
pub use crate::linked::Schema;
pub use crate::reporting::Error;
pub use crate::resolve::{resolve, ImportSource};

/// Parse a module from its source text.
pub fn parse(source: &str) -> Result<syntax::Module, Error> {
    syntax::Module::parse(source)
}
