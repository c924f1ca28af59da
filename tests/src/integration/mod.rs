//! Cross-subsystem flows through a running node.

mod node_lifecycle;
mod websocket_flows;
