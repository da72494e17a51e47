//! Default values shared by settings and their consumers

/// Messaging provider endpoints
pub mod endpoints {
    pub const GRAPH_API_BASE: &str = "https://graph.facebook.com";
    pub const GRAPH_API_VERSION: &str = "v21.0";
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
    pub const LOCAL_LLM_DEFAULT: &str = "http://localhost:11434/v1";
}

/// Tenant resolution
pub mod tenancy {
    pub const TENANT_HEADER: &str = "x-tenant-id";
    pub const TENANT_QUERY_PARAM: &str = "tenant";
    /// Tenant config cache lifetime
    pub const CACHE_TTL_SECS: u64 = 600;
}

/// Per-call timeouts in seconds
pub mod timeouts {
    pub const LLM_SECS: u64 = 30;
    pub const OUTBOUND_SECS: u64 = 10;
    pub const KNOWLEDGE_FETCH_SECS: u64 = 10;
    /// Webhook events slower than this are logged
    pub const EVENT_SECS: u64 = 90;
}

pub mod llm {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const MAX_HISTORY_TURNS: usize = 40;
}
