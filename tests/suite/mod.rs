//! Integration test suite modules

mod bans;
mod convergence;
mod exactly_once;
mod game_flow;
mod reachability;
