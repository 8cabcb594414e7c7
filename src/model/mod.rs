pub mod types;

pub use types::{Contact, DateRange, Dataset, Message, Statistics, contact_id};
