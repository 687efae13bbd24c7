mod emit;
mod input;
mod output_names;
mod resolve;
pub mod services;

pub use emit::emit;
pub use input::input;
pub use output_names::output_names;
pub use resolve::resolve;
