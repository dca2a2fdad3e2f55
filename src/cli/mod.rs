use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "solgate")]
#[command(about = "⚡ solgate - Solana agent gateway")]
#[command(long_about = "HTTP gateway exposing a Solana agent wallet, its action catalog and a tool-calling chat stream to web and mobile clients")]
#[command(version)]
pub struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind to (defaults to 5000 in production, 3001 otherwise)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Directory holding the built web client, served in production
    #[arg(long, env = "STATIC_DIR", default_value = "client/dist")]
    pub static_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn port(&self, production: bool) -> u16 {
        self.port.unwrap_or(if production { 5000 } else { 3001 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_follow_environment() {
        let args = Args::parse_from(["solgate"]);
        if std::env::var("PORT").is_err() {
            assert_eq!(args.port(true), 5000);
            assert_eq!(args.port(false), 3001);
        }

        let args = Args::parse_from(["solgate", "--port", "8080", "-v"]);
        assert_eq!(args.port(true), 8080);
        assert!(args.verbose);
    }
}
