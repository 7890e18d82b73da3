// crates/snapreel-core/src/helpers/mod.rs

pub mod time;
