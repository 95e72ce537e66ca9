//! Concrete service backends.

pub mod linkedin;
