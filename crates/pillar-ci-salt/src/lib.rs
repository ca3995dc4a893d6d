//! Salt master backends for pillar-ci.
//!
//! Each backend implements [`PillarRenderer`](pillar_ci_core::PillarRenderer):
//! - [`SaltRunRenderer`] runs `salt-run pillar.show_pillar` locally
//! - [`SaltApiRenderer`] calls the same runner through salt-api
//! - [`FixtureRenderer`] reads pre-rendered JSON from disk

pub mod config;
pub mod fixtures;
pub mod pillar;
pub mod salt_api;
pub mod salt_run;

pub use config::{build_renderer, Backend, ConfigError, RendererConfig, SaltApiConfig};
pub use fixtures::FixtureRenderer;
pub use pillar::{pillar_from_str, pillar_from_value, PILLAR_ERRORS_KEY};
pub use salt_api::{extract_return, SaltApiRenderer};
pub use salt_run::{SaltRunRenderer, DEFAULT_SALT_RUN};
