//! Positional invocation tokens
//!
//! Tokens are order-independent bare words. Unknown words are logged and
//! ignored so a newer installer can be driven by an older launcher script.

use log::warn;

pub const COMPILE: &str = "compile";
pub const NOOPEN: &str = "noopen";
pub const STATUS: &str = "status";

/// Invocation tokens recognised by the bootstrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokens {
    /// Skip the compile prompt and build right away
    pub compile: bool,
    /// Do not open the install directory or re-launch after staging
    pub noopen: bool,
    /// Report state and exit without changing anything
    pub status: bool,
}

impl Tokens {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = Self::default();
        for arg in args {
            match arg.as_ref() {
                COMPILE => tokens.compile = true,
                NOOPEN => tokens.noopen = true,
                STATUS => tokens.status = true,
                other => warn!("Ignoring unknown argument: {other}"),
            }
        }
        tokens
    }

    /// Tokens to forward to the re-invoked binary after a build
    pub fn forwarded(&self) -> Vec<String> {
        if self.noopen {
            vec![NOOPEN.to_string()]
        } else {
            Vec::new()
        }
    }
}
