pub mod extract;
pub mod locator;
