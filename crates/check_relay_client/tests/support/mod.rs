#![allow(dead_code)]

pub mod relay;
