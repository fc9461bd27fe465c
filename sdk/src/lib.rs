//! IBM Watson API SDK for Rust.
//!
//! One generic [`Service`] facade drives every Watson service family from a
//! table of [`EndpointDescriptor`]s. Calls are validated locally, sent once
//! with Basic, IAM or bearer authentication, and mapped into a
//! [`DetailedResponse`] that keeps the raw headers and body next to the
//! typed result. Text to Speech and Speech to Text also expose a duplex
//! [`StreamingChannel`].

pub mod auth;
pub mod catalog;
mod client;
pub mod endpoint;
mod error;
pub mod http;
pub mod request;
mod response;
mod service;
pub mod stream;

pub use auth::{Authenticator, Credentials, IamTokenManager};
pub use catalog::ServiceKind;
pub use client::{Client, ClientBuilder};
pub use endpoint::{EndpointDescriptor, ServiceDefinition};
pub use error::{Error, Result};
pub use request::{CallArgs, Multipart, audio_content_type, content_type_for_path};
pub use response::{CustomData, DetailedResponse, Payload};
pub use service::Service;
pub use stream::{CancelHandle, ChannelHandler, ChannelState, StreamingChannel};
