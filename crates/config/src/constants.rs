//! Centralized constants
//!
//! Defaults shared by the server, the LLM services and the client side
//! agent. Settings fall back to these when a value is not configured.

/// LLM endpoint defaults
pub mod llm {
    /// Groq's OpenAI-compatible API
    pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1";

    pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

    /// Analysis wants stable, conservative output
    pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

    /// Quiz turns are conversational
    pub const TURN_TEMPERATURE: f32 = 0.7;

    pub const DEFAULT_MAX_TOKENS: usize = 2048;

    /// Placeholder some deployments ship instead of a real key
    pub const DUMMY_API_KEY: &str = "dummy_key";

    /// Environment variables consulted for the credential, in order
    pub const API_KEY_ENV_VARS: [&str; 2] = ["NEXT_PUBLIC_GROQ_API_KEY", "GROQ_API_KEY"];
}

/// Document analysis limits
pub mod analysis {
    /// Characters of combined notes sent to the model
    pub const MAX_CHARS: usize = 12_000;

    /// Upload body limit (bytes)
    pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
}

/// Course chat
pub mod chat {
    /// Messages returned by a list call
    pub const HISTORY_LIMIT: usize = 50;

    /// Client poll interval
    pub const POLL_INTERVAL_MS: u64 = 5_000;
}

/// Client-side cache key prefixes
pub mod storage {
    pub const ANALYSIS_KEY_PREFIX: &str = "loominary_data_";
    pub const MISTAKES_KEY_PREFIX: &str = "loominary_mistakes_";
}

/// Session tokens
pub mod auth {
    pub const TOKEN_TTL_HOURS: u64 = 24 * 30;
}
