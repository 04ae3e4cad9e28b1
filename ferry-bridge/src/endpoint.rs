//! Where the compilation service lives.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable consulted by the CLI for the service endpoint.
pub const SERVICE_ENV: &str = "FERRY_SERVICE";

/// Endpoint used when nothing else is configured.
pub const DEFAULT_SERVICE: &str = "ferry-compiler --stdio";

const SOCKET_PREFIX: &str = "unix:";

/// A Unix socket the service listens on, or a command that speaks the
/// protocol on its stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEndpoint {
    Socket(PathBuf),
    Command { program: String, args: Vec<String> },
}

impl FromStr for ServiceEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(SOCKET_PREFIX) {
            if path.is_empty() {
                return Err("socket endpoint needs a path after 'unix:'".to_string());
            }
            return Ok(Self::Socket(PathBuf::from(path)));
        }
        let mut words = s.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| "service endpoint is empty".to_string())?;
        Ok(Self::Command {
            program,
            args: words.collect(),
        })
    }
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self::Command {
            program: "ferry-compiler".to_string(),
            args: vec!["--stdio".to_string()],
        }
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(path) => write!(f, "{SOCKET_PREFIX}{}", path.display()),
            Self::Command { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}
