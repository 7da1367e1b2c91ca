//! Application layer: ports, DTOs, use cases, and running services.
//!
//! Orchestrates domain logic behind the ports; contains no broker, bus, or
//! storage specifics of its own.

pub mod dto;
pub mod ports;
pub mod services;
pub mod use_cases;
