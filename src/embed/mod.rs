//! Embedded static resources.
//!
//! # Usage
//!
//! ```ignore
//! use embed::agent::{RELOAD_AGENT_JS, AgentVars};
//!
//! let js = RELOAD_AGENT_JS.render(&AgentVars { endpoint: "ws://127.0.0.1:8002".into() });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod agent {
    use super::{Template, TemplateVars};

    /// Variables for reload-agent.js.
    pub struct AgentVars {
        /// Channel URL, e.g. `ws://127.0.0.1:8002`
        pub endpoint: String,
    }

    impl TemplateVars for AgentVars {
        fn values(&self) -> Vec<(&'static str, String)> {
            vec![("__WEBEXT_DEV_ENDPOINT__", self.endpoint.clone())]
        }
    }

    /// Background listener stub injected by the manifest adapter.
    pub const RELOAD_AGENT_JS: Template<AgentVars> =
        Template::new(include_str!("agent/reload-agent.js"));
}
