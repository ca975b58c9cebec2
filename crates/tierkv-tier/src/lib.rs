//! Backend assembly and tiered composition for tierkv.
//!
//! Given a [`TierConfig`] and the [`HostCapabilities`] the hosting
//! environment injects, [`assemble`] builds every usable backend and orders
//! them by priority into a [`TierSet`]. [`TieredStore`] then presents the set
//! as a single [`StringStore`](tierkv_store::StringStore).
//!
//! ```no_run
//! use tierkv_store::StringStore;
//! use tierkv_tier::{HostCapabilities, TierConfig, TieredStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TierConfig::from_toml_str("scope = \"app\"")?;
//! let caps = HostCapabilities::none().with_directory("/var/lib/app");
//! let store = TieredStore::from_config(&config, &caps).await?;
//! store.set("theme", "dark").await?;
//! assert_eq!(store.get("theme").await?.as_deref(), Some("dark"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod tiered;

pub use config::{PriorityConfig, TierConfig, DEFAULT_SCOPE};
pub use error::{TierError, TierResult};
pub use factory::{assemble, probe, HostCapabilities, TierSet};
pub use tiered::{KeyState, TieredStore};
