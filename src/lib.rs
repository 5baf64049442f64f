//! Multi-provider credential broker for song-request services: cached client-credentials tokens,
//! PKCE flows with encrypted refresh tokens, catalog search, and a volatile web-push registry.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod access;
pub mod auth;
pub mod broker;
pub mod codec;
pub mod config;
pub mod error;
pub mod flows;
pub mod health;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod push;
pub mod store;

pub use broker::Broker;
pub use error::{Error, Result};

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
