pub mod client;
pub mod crypto;
pub mod retry;
pub mod transfer;
pub mod wire;

pub use client::{
    ClientConfig, Credentials, DEFAULT_BASE_URL, MAX_PAGES, PAGE_SIZE, StarCloudClient,
};
pub use crypto::CredentialCipher;
pub use retry::RetryPolicy;
pub use transfer::HttpTransfer;
