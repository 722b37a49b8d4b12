pub mod module;
pub mod relationship;

pub use module::Module;
