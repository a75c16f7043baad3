//! Typed OCPP payloads
//!
//! Plain serde structs matching the JSON schemas under `schemas/`. Routing
//! validates against the schema first, so decoding here only has to cope with
//! schema-valid input.

pub mod has2be;
pub mod v16;
pub mod v201;
pub mod variable_name;
