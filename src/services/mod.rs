// Business logic services

pub mod file_storage;
pub mod file_type;
pub mod initializers;
pub mod lifecycle;
pub mod multipart_builder;
pub mod object_id;
