use std::env;
use std::fmt;

/// Secure secret wrapper that prevents accidental logging of OAuth client
/// secrets and tokens
#[derive(Clone)]
pub struct SecureSecret {
    value: String,
}

impl SecureSecret {
    /// Create a new secure secret
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// Get the secret (use with caution)
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Load a secret from an environment variable
    pub fn from_env(var_name: &str) -> Result<Self, CredentialError> {
        env::var(var_name)
            .map_err(|_| CredentialError::Missing(var_name.to_string()))
            .and_then(|value| {
                if value.is_empty() {
                    Err(CredentialError::Empty(var_name.to_string()))
                } else {
                    Ok(Self::new(value))
                }
            })
    }

    /// Mask the secret for logging (shows only first 4 and last 4 characters)
    pub fn mask(&self) -> String {
        if self.value.len() <= 8 {
            "****".to_string()
        } else {
            format!(
                "{}...{}",
                &self.value[..4],
                &self.value[self.value.len() - 4..]
            )
        }
    }

    /// True when the secret is non-empty
    pub fn is_set(&self) -> bool {
        !self.value.is_empty()
    }
}

impl fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSecret")
            .field("value", &self.mask())
            .finish()
    }
}

impl fmt::Display for SecureSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mask())
    }
}

/// Credential loading error
#[derive(Debug, Clone)]
pub enum CredentialError {
    Missing(String),
    Empty(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing(var) => write!(f, "Missing environment variable: {}", var),
            CredentialError::Empty(var) => write!(f, "Empty credential in: {}", var),
        }
    }
}

impl std::error::Error for CredentialError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_short_secret() {
        let secret = SecureSecret::new("abcd".to_string());
        assert_eq!(secret.mask(), "****");
    }

    #[test]
    fn test_mask_long_secret() {
        let secret = SecureSecret::new("abcdefghijkl".to_string());
        assert_eq!(secret.mask(), "abcd...ijkl");
    }

    #[test]
    fn test_debug_never_exposes() {
        let secret = SecureSecret::new("super-secret-value".to_string());
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
    }
}
