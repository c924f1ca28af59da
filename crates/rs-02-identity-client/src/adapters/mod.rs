pub mod registry;
pub mod upstream;
