pub mod markup;
pub mod width;
