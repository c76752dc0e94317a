// Peer-to-peer node and request surface

mod node;
mod routes;

pub use node::{Node, NodeState};
