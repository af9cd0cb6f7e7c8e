// @generated
// This file is @generated by prost-build.
/// Subscribe to a single location.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TemperatureRequest {
    #[prost(string, tag = "1")]
    pub location: ::prost::alloc::string::String,
}
/// One generated reading.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TemperatureData {
    #[prost(string, tag = "1")]
    pub location: ::prost::alloc::string::String,
    #[prost(double, tag = "2")]
    pub temperature: f64,
    /// RFC 3339, UTC, microsecond precision.
    #[prost(string, tag = "3")]
    pub timestamp: ::prost::alloc::string::String,
}
include!("temperature.v1.tonic.rs");
// @@protoc_insertion_point(module)
