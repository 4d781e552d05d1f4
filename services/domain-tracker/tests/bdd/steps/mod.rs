//! BDD step definitions for domain tracker service

pub mod detection_steps;
pub mod failure_steps;
