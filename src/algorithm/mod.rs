//! Analysis algorithms

pub mod adherence;
