//! Cookie-credentialed REST client for the LMS API: coordinated session refresh with request
//! replay, a cached session view for role-gated screens, and session-expiry notifications.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod session;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
