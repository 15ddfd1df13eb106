//! # dlp-types
//!
//! Protobuf message types for the Cloud DLP v2 API surface emulated by the
//! fake DLP service.
//!
//! Only the messages of the instrumented calls are modelled field by field.
//! Every other call is answered with [`Inert`], an empty message: the empty
//! encoding is the default value of every proto3 message, so it is a valid
//! response for any method of the service.
//!
//! ## Hand-written messages
//!
//! The types are declared with `prost` derives instead of being generated
//! from the googleapis protos. Fields that the harness never inspects
//! (inspect configs, tables, finding details) are left out; prost skips
//! unknown fields while decoding, so requests carrying them still decode.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)] // prost derives generate undocumented items

pub use prost::Message;

/// Fully-qualified gRPC service name of the DLP v2 API.
pub const DLP_SERVICE: &str = "google.privacy.dlp.v2.DlpService";

/// Every method of `google.privacy.dlp.v2.DlpService`.
pub const DLP_METHODS: &[&str] = &[
    "ActivateJobTrigger",
    "CancelDlpJob",
    "CreateDeidentifyTemplate",
    "CreateDlpJob",
    "CreateInspectTemplate",
    "CreateJobTrigger",
    "CreateStoredInfoType",
    "DeidentifyContent",
    "DeleteDeidentifyTemplate",
    "DeleteDlpJob",
    "DeleteInspectTemplate",
    "DeleteJobTrigger",
    "DeleteStoredInfoType",
    "FinishDlpJob",
    "GetDeidentifyTemplate",
    "GetDlpJob",
    "GetInspectTemplate",
    "GetJobTrigger",
    "GetStoredInfoType",
    "HybridInspectDlpJob",
    "HybridInspectJobTrigger",
    "InspectContent",
    "ListDeidentifyTemplates",
    "ListDlpJobs",
    "ListInfoTypes",
    "ListInspectTemplates",
    "ListJobTriggers",
    "ListStoredInfoTypes",
    "RedactImage",
    "ReidentifyContent",
    "UpdateDeidentifyTemplate",
    "UpdateInspectTemplate",
    "UpdateJobTrigger",
    "UpdateStoredInfoType",
];

/// Build the HTTP/2 path of a DLP method, e.g. `/google.privacy.dlp.v2.DlpService/InspectContent`.
pub fn method_path(method: &str) -> String {
    format!("/{}/{}", DLP_SERVICE, method)
}

/// Split a request path into its DLP method name.
///
/// Returns `None` for paths outside the DLP service.
pub fn method_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let (service, method) = rest.split_once('/')?;
    if service != DLP_SERVICE || method.is_empty() {
        return None;
    }
    Some(method)
}

/// Empty message used for every non-instrumented request and response.
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct Inert {}

/// Type of a byte content item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BytesType {
    Unspecified = 0,
    TextUtf8 = 5,
}

/// Raw bytes to inspect.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ByteContentItem {
    #[prost(enumeration = "BytesType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: ::prost::bytes::Bytes,
}

/// Container for the data to inspect.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContentItem {
    #[prost(oneof = "content_item::DataItem", tags = "3, 5")]
    pub data_item: ::core::option::Option<content_item::DataItem>,
}

pub mod content_item {
    /// The inspected data.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum DataItem {
        #[prost(string, tag = "3")]
        Value(::prost::alloc::string::String),
        #[prost(message, tag = "5")]
        ByteItem(super::ByteContentItem),
    }
}

impl ContentItem {
    /// Content item wrapping a UTF-8 byte payload.
    pub fn text_bytes(data: impl Into<::prost::bytes::Bytes>) -> Self {
        Self {
            data_item: Some(content_item::DataItem::ByteItem(ByteContentItem {
                r#type: BytesType::TextUtf8 as i32,
                data: data.into(),
            })),
        }
    }

    /// The payload bytes, whichever variant carries them.
    pub fn payload(&self) -> ::prost::bytes::Bytes {
        match &self.data_item {
            Some(content_item::DataItem::ByteItem(item)) => item.data.clone(),
            Some(content_item::DataItem::Value(value)) => {
                ::prost::bytes::Bytes::copy_from_slice(value.as_bytes())
            }
            None => ::prost::bytes::Bytes::new(),
        }
    }
}

/// Request of `InspectContent`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectContentRequest {
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub item: ::core::option::Option<ContentItem>,
    #[prost(string, tag = "4")]
    pub inspect_template_name: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub location_id: ::prost::alloc::string::String,
}

/// Response of `InspectContent`. Findings are never produced by the fake.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InspectContentResponse {}

/// Item sent to a hybrid job trigger.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HybridContentItem {
    #[prost(message, optional, tag = "1")]
    pub item: ::core::option::Option<ContentItem>,
}

/// Request of `HybridInspectJobTrigger`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HybridInspectJobTriggerRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub hybrid_item: ::core::option::Option<HybridContentItem>,
}

/// Response of the hybrid inspect calls.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HybridInspectResponse {}
