// Core modules implementing row parsing, acceptance checking, and error modeling.
pub mod check;
pub mod error;
pub mod row;
