#![allow(dead_code)]

#[cfg(unix)]
pub mod aws;
pub mod fakes;
pub mod git;
