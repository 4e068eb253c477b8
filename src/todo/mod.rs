pub mod item;

pub use item::TodoItem;
