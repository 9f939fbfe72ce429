//! Channel access token types

use serde::{Deserialize, Serialize};

/// Channel access token issued by the messaging platform's token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub key_id: String,
}
