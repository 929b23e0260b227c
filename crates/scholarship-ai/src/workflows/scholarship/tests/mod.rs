mod allowance;
mod common;
