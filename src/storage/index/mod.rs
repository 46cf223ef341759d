pub mod b_plus_tree;
pub mod node;

pub use b_plus_tree::BPlusTree;
pub use node::{Node, Value};
