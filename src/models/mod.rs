//! Request and Response models for the admin API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{validate_key, CleanBackupsRequest, FieldsRequest, PutValueRequest};
pub use responses::{
    BackupListResponse, CleanBackupsResponse, DeleteResponse, FieldsResponse, HealthResponse,
    PrefetchStatus, RotateResponse, SetResponse, StatsResponse, ValueResponse,
};
