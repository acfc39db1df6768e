pub mod client;
pub mod dates;
pub mod document;
pub mod money;
pub mod tenant;
pub mod transaction;
