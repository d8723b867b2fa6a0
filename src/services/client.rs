//! AWS client configuration

/// Configuration for the AWS CLI client
#[derive(Debug, Clone)]
pub struct AwsClientConfig {
    /// Path to the `aws` executable
    ///
    /// If not provided, defaults to "aws" (assumes it's on PATH).
    pub aws_path: Option<String>,

    /// Region passed as `--region`
    pub region: Option<String>,

    /// Named profile passed as `--profile`
    pub profile: Option<String>,

    /// Timeout for a single CLI call in seconds
    pub timeout_secs: u64,
}

impl Default for AwsClientConfig {
    fn default() -> Self {
        Self {
            aws_path: None,
            region: None,
            profile: None,
            timeout_secs: 120,
        }
    }
}

impl AwsClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aws_path(mut self, path: String) -> Self {
        self.aws_path = Some(path);
        self
    }

    pub fn with_region(mut self, region: String) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_profile(mut self, profile: String) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
