pub mod cell;
pub mod dataset;
pub mod history;

pub use dataset::{Column, Dataset, DatasetError, FileRef, Record};
pub use history::History;
