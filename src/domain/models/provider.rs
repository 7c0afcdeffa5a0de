use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud or SaaS provider whose management API is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Google,
    Azure,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Google => "google",
            Self::Azure => "azure",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "google" | "gcp" => Ok(Self::Google),
            "azure" | "azurerm" => Ok(Self::Azure),
            "github" => Ok(Self::Github),
            _ => Err(anyhow::anyhow!("Invalid provider: {s}")),
        }
    }
}
