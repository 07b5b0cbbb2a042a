#![warn(
    clippy::all,
    clippy::doc_markdown,
    clippy::dbg_macro,
    clippy::todo,
    clippy::mem_forget,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    missing_debug_implementations,
    nonstandard_style,
    unused_import_braces,
    unused_qualifications
)]
#![deny(
    clippy::await_holding_lock,
    clippy::if_let_mutex,
    clippy::mem_forget,
    clippy::ok_expect,
    clippy::unimplemented,
    clippy::unwrap_used,
    unsafe_code,
    unstable_features,
    unused_results
)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod ast;
pub mod automaton;
pub mod bind;
pub mod compile;
pub mod emit;
pub mod error;
pub mod reference;
pub mod type_;

#[cfg(test)]
pub(crate) mod eval;
#[cfg(test)]
pub(crate) mod testing;

pub use compile::{
    compile_assignment, compile_is_match, compile_match, compile_match_reference, CompiledMatch,
};
pub use error::{Error, Result, Warning};
