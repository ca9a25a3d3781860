//! # NexRPC CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve the demo services
//! nexrpc serve -b 0.0.0.0:9000
//!
//! # Call a demo method on a known endpoint (prints the reply)
//! nexrpc call 127.0.0.1:9000 hello -m "This is a message" --id 12
//! nexrpc call 127.0.0.1:9000 bye -m ann -s json
//! ```

use anyhow::Result;
use argh::FromArgs;
use nexrpc_cli::call::{run_call, CallOptions, DemoMethod};
use nexrpc_cli::serve::{run_serve, ServeOptions};
use nexrpc_common::transport::Serializer;
use nexrpc_common::Endpoint;
use std::time::Duration;

#[derive(FromArgs)]
/// NexRPC - binary-framed RPC runtime
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Arguments for starting a server.
///
/// The server publishes `HelloService` and `ByeService`, registers them in
/// a process-local directory and runs until Ctrl-C.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the demo services
struct ServeArgs {
    /// address to listen on
    #[argh(option, short = 'b', default = "\"127.0.0.1:9000\".into()")]
    bind: String,

    /// endpoint to register instead of the bound address
    #[argh(option, long = "advertise")]
    advertise: Option<Endpoint>,

    /// close connections silent for this many seconds (0 disables)
    #[argh(option, long = "read-idle-secs", default = "30")]
    read_idle_secs: u64,

    /// maximum concurrent method invocations
    #[argh(option, short = 'w', long = "workers", default = "16")]
    workers: usize,
}

/// Arguments for a single call.
///
/// The reply is printed to stdout and nothing else is, so the command can
/// be used from scripts. Errors go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a demo service method
struct CallArgs {
    /// server endpoint, host:port
    #[argh(positional)]
    endpoint: Endpoint,

    /// method to call: hello or bye
    #[argh(positional)]
    method: DemoMethod,

    /// message for hello, name for bye
    #[argh(option, short = 'm', long = "message", default = "\"This is a message\".into()")]
    message: String,

    /// id for hello
    #[argh(option, long = "id", default = "12")]
    id: i32,

    /// payload serializer: bincode, json, postcard or a numeric code
    #[argh(option, short = 's', long = "serializer", default = "Serializer::Bincode")]
    serializer: Serializer,

    /// call timeout in milliseconds
    #[argh(option, long = "timeout-ms", default = "10000")]
    timeout_ms: u64,
}

impl From<ServeArgs> for ServeOptions {
    fn from(args: ServeArgs) -> Self {
        ServeOptions {
            bind: args.bind,
            advertise: args.advertise,
            read_idle: (args.read_idle_secs > 0).then(|| Duration::from_secs(args.read_idle_secs)),
            workers: args.workers,
        }
    }
}

impl From<CallArgs> for CallOptions {
    fn from(args: CallArgs) -> Self {
        CallOptions {
            endpoint: args.endpoint,
            method: args.method,
            id: args.id,
            message: args.message,
            serializer: args.serializer,
            timeout: Duration::from_millis(args.timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call keeps stdout clean for piping
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args.into()).await,
        Commands::Call(args) => {
            let reply = run_call(args.into()).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let cli = Cli::from_args(&["nexrpc"], &["serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                let options = ServeOptions::from(args);
                assert_eq!(options.bind, "127.0.0.1:9000");
                assert!(options.advertise.is_none());
                assert_eq!(options.read_idle, Some(Duration::from_secs(30)));
                assert_eq!(options.workers, 16);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_with_options() {
        let cli = Cli::from_args(
            &["nexrpc"],
            &[
                "serve",
                "-b", "0.0.0.0:9100",
                "--advertise", "rpc.local:9100",
                "--read-idle-secs", "0",
                "-w", "4",
            ],
        )
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                let options = ServeOptions::from(args);
                assert_eq!(options.bind, "0.0.0.0:9100");
                assert_eq!(options.advertise, Some(Endpoint::new("rpc.local", 9100)));
                assert_eq!(options.read_idle, None);
                assert_eq!(options.workers, 4);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_call() {
        let cli = Cli::from_args(
            &["nexrpc"],
            &["call", "127.0.0.1:9000", "bye", "-m", "ann", "-s", "json", "--timeout-ms", "500"],
        )
        .unwrap();
        match cli.command {
            Commands::Call(args) => {
                let options = CallOptions::from(args);
                assert_eq!(options.endpoint, Endpoint::new("127.0.0.1", 9000));
                assert_eq!(options.method, DemoMethod::Bye);
                assert_eq!(options.message, "ann");
                assert_eq!(options.id, 12);
                assert_eq!(options.serializer, Serializer::Json);
                assert_eq!(options.timeout, Duration::from_millis(500));
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_call_rejects_unknown_method() {
        assert!(Cli::from_args(&["nexrpc"], &["call", "127.0.0.1:9000", "wave"]).is_err());
    }

    #[test]
    fn test_cli_parse_call_rejects_bad_endpoint() {
        assert!(Cli::from_args(&["nexrpc"], &["call", "localhost", "hello"]).is_err());
    }
}
