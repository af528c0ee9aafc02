//! Static connectivity analysis for cloud VPC configurations.
//!
//! Given the resources of one or more VPCs (interfaces, subnets, security
//! groups, network ACLs, gateways), this library computes which traffic can
//! flow between every ordered pair of endpoints, without sending a packet.
//! All set operations are exact and come from `netset-core`.
//!
//! # Architecture
//!
//! ## Model
//!
//! - [`model`] — arena-backed configuration: nodes, node-sets, name and UID
//!   indexes, the [`model::Endpoint`] sum type
//! - [`settings`] — reserved ranges and report defaults from TOML
//! - [`loader`] — JSON/TOML documents to configurations
//!
//! ## Evaluation
//!
//! - [`filters`] — security-group and network-ACL layers with rule
//!   attribution
//! - [`routers`] — public gateways, floating IPs, transit gateways
//! - [`compose`] — per-pair composition of routers and filter layers
//!
//! ## Derived views
//!
//! - [`subnets`] — subnet-level connectivity
//! - [`abstraction`] — node-set abstraction with missing-connectivity report
//! - [`grouping`] — compact report lines
//! - [`diff`] — connectivity diff of two configurations
//! - [`explain`] — why (or why not) two endpoints connect
//! - [`lint`] — redundant rules and unattached filters
//!
//! ## Reporting
//!
//! - [`format`] — text, Markdown, JSON and debug renderers
//!
//! # Workflow
//!
//! 1. **Load** a document into a [`model::MultiVpcConfig`]
//! 2. **Compose** every pair with [`compose::analyze_endpoints`]
//! 3. Optionally **lift** to subnets and **group**
//! 4. **Render**, or **diff** / **explain** against the same model
//!
//! # Examples
//!
//! ```ignore
//! use vpc_connectivity::compose::analyze_endpoints;
//! use vpc_connectivity::format::{plain_lines, render_text};
//! use vpc_connectivity::loader::load_config;
//! use vpc_connectivity::settings::default_settings;
//!
//! let public = default_settings().public_internet()?;
//! let configs = load_config("config.json".as_ref(), &public)?;
//! for config in configs.single_vpc_configs() {
//!     let map = analyze_endpoints(config)?;
//!     println!("{}", render_text(&plain_lines(config, &map)));
//! }
//! ```

pub mod abstraction;
pub mod compose;
pub mod diff;
pub mod error;
pub mod explain;
pub mod filters;
pub mod format;
pub mod grouping;
pub mod lint;
pub mod loader;
pub mod model;
pub mod routers;
pub mod settings;
pub mod subnets;

pub use error::AnalysisError;
