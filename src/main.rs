#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sftp_session::sftp::{ConnectionConfig, DEFAULT_DIR_PERMISSIONS, SftpSession};
use tracing::info;

const ENV_HELP: &str = "Connection settings come from SFTP_HOST, SFTP_PORT, SFTP_USERNAME,
SFTP_PASSWORD, SFTP_PUBLIC_KEY, SFTP_PRIVATE_KEY and SFTP_PASSPHRASE.";

/// Run one SFTP operation against a remote host.
#[derive(Debug, Parser)]
#[command(
    name = "sftp-session",
    version,
    about = "Run one SFTP operation against a remote host",
    after_help = ENV_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// List a directory as JSON
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },
    /// Upload a local file
    Put {
        #[arg(allow_hyphen_values = true)]
        local: PathBuf,
        remote: String,
    },
    /// Download a file (temporary path when LOCAL is omitted)
    Get { remote: String, local: Option<PathBuf> },
    /// Print a remote file
    Cat { remote: String },
    /// Remove a remote file
    Rm { remote: String },
    /// Print a remote file size in bytes
    Size { remote: String },
}

/// Build the connection configuration from `SFTP_*` environment variables.
fn config_from_env() -> Result<ConnectionConfig, Box<dyn std::error::Error>> {
    let address = env::var("SFTP_HOST").map_err(|_| "SFTP_HOST is not set")?;
    let mut config = ConnectionConfig::from_address(&address)?;

    if let Ok(port) = env::var("SFTP_PORT") {
        config = config.port(port.parse()?);
    }

    let username = env::var("SFTP_USERNAME").unwrap_or_else(|_| "root".to_string());
    if let Ok(password) = env::var("SFTP_PASSWORD") {
        config = config.configure_login(username.clone(), password);
    }
    if let (Ok(public_key), Ok(private_key)) =
        (env::var("SFTP_PUBLIC_KEY"), env::var("SFTP_PRIVATE_KEY"))
    {
        config = config.configure_key_login(
            username,
            public_key,
            private_key,
            env::var("SFTP_PASSPHRASE").ok(),
        );
    }

    Ok(config)
}

async fn run(session: &mut SftpSession, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Ls { path, recursive } => {
            let entries = session.list(&path, recursive).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Mkdir { path, parents } => {
            session.mkdir(&path, DEFAULT_DIR_PERMISSIONS, parents).await?;
        }
        Command::Put { local, remote } => {
            session.upload(&local, &remote).await?;
            info!("Uploaded {} to {}", local.display(), remote);
        }
        Command::Get { remote, local } => {
            let saved = session.download(&remote, local.as_deref()).await?;
            println!("{}", saved.display());
        }
        Command::Cat { remote } => {
            let data = session.read(&remote).await?;
            print!("{}", String::from_utf8_lossy(&data));
        }
        Command::Rm { remote } => {
            session.delete(&remote).await?;
        }
        Command::Size { remote } => {
            println!("{}", session.filesize(&remote).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenv().ok();

    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let mut session = SftpSession::new(config_from_env()?);
    session.connect().await?;

    let result = run(&mut session, cli.command).await;
    session.disconnect().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("sftp-session").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    mod commands {
        use super::*;

        #[test]
        fn test_ls_defaults_to_root() {
            assert_eq!(
                parse(&["ls"]).unwrap(),
                Command::Ls {
                    path: "/".to_string(),
                    recursive: false
                }
            );
        }

        #[test]
        fn test_ls_recursive_short_and_long() {
            let expected = Command::Ls {
                path: "/srv".to_string(),
                recursive: true,
            };
            assert_eq!(parse(&["ls", "-r", "/srv"]).unwrap(), expected);
            assert_eq!(parse(&["ls", "--recursive", "/srv"]).unwrap(), expected);
        }

        #[test]
        fn test_mkdir_parents() {
            assert_eq!(
                parse(&["mkdir", "/a/b", "-p"]).unwrap(),
                Command::Mkdir {
                    path: "/a/b".to_string(),
                    parents: true
                }
            );
        }

        #[test]
        fn test_put_requires_both_paths() {
            assert!(parse(&["put", "local.txt"]).is_err());
        }

        #[test]
        fn test_put_accepts_local_name_starting_with_dash() {
            assert_eq!(
                parse(&["put", "-notes.txt", "/r"]).unwrap(),
                Command::Put {
                    local: PathBuf::from("-notes.txt"),
                    remote: "/r".to_string()
                }
            );
        }

        #[test]
        fn test_get_optional_local() {
            assert_eq!(
                parse(&["get", "/r.txt"]).unwrap(),
                Command::Get {
                    remote: "/r.txt".to_string(),
                    local: None
                }
            );
            assert_eq!(
                parse(&["get", "/r.txt", "out.txt"]).unwrap(),
                Command::Get {
                    remote: "/r.txt".to_string(),
                    local: Some(PathBuf::from("out.txt"))
                }
            );
        }

        #[test]
        fn test_unknown_flag_is_rejected() {
            assert!(parse(&["rm", "-rf", "/srv/x"]).is_err());
        }

        #[test]
        fn test_extra_positionals_are_rejected() {
            assert!(parse(&["cat", "/a", "/b", "/c"]).is_err());
        }

        #[test]
        fn test_unknown_command() {
            assert!(parse(&["chmod", "/x"]).is_err());
        }

        #[test]
        fn test_missing_command() {
            assert!(parse(&[]).is_err());
        }
    }
}
