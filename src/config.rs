use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub pinata_api_url: String,
    pub pinata_gateway_url: String,
    /// Bearer token for the pinning API. Uploads fail without it;
    /// gateway reads do not need it.
    pub pinata_jwt: Option<String>,
}

impl VaultConfig {
    pub fn load() -> Self {
        Self {
            pinata_api_url: std::env::var("PINATA_API_URL")
                .unwrap_or_else(|_| "https://api.pinata.cloud/pinning/pinFileToIPFS".to_string()),
            pinata_gateway_url: std::env::var("PINATA_GATEWAY_URL")
                .unwrap_or_else(|_| "https://gateway.pinata.cloud/ipfs".to_string()),
            pinata_jwt: std::env::var("PINATA_JWT").ok(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::load()
    }
}
