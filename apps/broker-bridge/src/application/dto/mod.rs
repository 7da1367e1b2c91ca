//! Data Transfer Objects (DTOs)
//!
//! Wire shapes for the inbound request boundary.

mod request_dto;

pub use request_dto::{
    CancelPayload, InboundRequest, SubmitPayload, ValidationError,
};
