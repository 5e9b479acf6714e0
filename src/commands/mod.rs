mod annotate;
mod export;

pub use annotate::*;
pub use export::*;
