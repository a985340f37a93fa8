//! Data transform handlers.

mod compare;
mod crypto;
mod datetime;
mod dedupe;
mod html;
mod item_lists;
mod json;
mod markdown;
mod regex_node;
mod set_fields;
mod sort;
mod spreadsheet;
mod xml;

pub use compare::CompareDatasets;
pub use crypto::Crypto;
pub use datetime::DateTime;
pub use dedupe::RemoveDuplicates;
pub use html::Html;
pub use item_lists::ItemLists;
pub use json::Json;
pub use markdown::Markdown;
pub use regex_node::RegexNode;
pub use set_fields::SetFields;
pub use sort::Sort;
pub use spreadsheet::Spreadsheet;
pub use xml::Xml;
