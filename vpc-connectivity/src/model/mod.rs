//! Configuration model: resources, endpoints and the per-VPC configuration.

mod config;
mod endpoint;
mod node;
mod resource;

pub use config::{ConfigBuilder, MultiVpcConfig, ResourceRef, VpcConfig};
pub use endpoint::{Endpoint, EndpointRef};
pub use node::{Node, NodeId, NodeSet, NodeSetId};
pub use resource::{NamedResource, ResourceInfo, ResourceKind};
