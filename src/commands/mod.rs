pub mod print_header;

pub use print_header::print_header;
