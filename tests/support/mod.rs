#![allow(dead_code)]

pub mod capsync_env;
pub mod fake_remote;
pub mod fixtures;
