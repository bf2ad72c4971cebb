//! Generated protocol types for `proto/provider.proto`.
//!
//! Built by `build.rs`. The service trait is `provider_server::Provider` and
//! the matching client is `provider_client::ProviderClient`.

#![allow(missing_docs)]
#![allow(clippy::all)]

tonic::include_proto!("supabase.provider.v1");
