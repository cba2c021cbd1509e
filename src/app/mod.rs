mod compare;
mod export;
mod progress;
mod runner;
mod summary;


pub(crate) use compare::run_compare;
pub(crate) use runner::{run_bulk_command, run_chain, run_load};
