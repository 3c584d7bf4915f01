// Command modules for the aero-lp CLI

pub mod balance;
pub mod position;
pub mod status;
pub mod utils;
