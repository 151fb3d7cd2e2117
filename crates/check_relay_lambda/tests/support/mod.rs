#![allow(dead_code)]

pub mod aws;
pub mod commands;
pub mod queue;
