//! Skydome - dynamic sky and weather state manager

pub mod core;
pub mod scene;
pub mod sky;
