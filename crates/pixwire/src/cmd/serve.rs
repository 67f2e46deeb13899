use std::sync::Arc;

use pixwire_peer::{EchoHandler, EmptyHandler, PayloadHandler, Server, ServerConfig, ShutdownHandle};

use crate::cmd::{ResponseMode, ServeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = server_config(&args)?;
    let handler: Arc<dyn PayloadHandler> = match args.respond {
        ResponseMode::Echo => Arc::new(EchoHandler),
        ResponseMode::Empty => Arc::new(EmptyHandler),
    };

    let server = Server::bind(config, handler).map_err(|err| peer_error("bind failed", err))?;
    install_ctrlc_handler(server.shutdown_handle())?;

    server.serve();
    Ok(SUCCESS)
}

fn server_config(args: &ServeArgs) -> CliResult<ServerConfig> {
    if args.max_message_size < pixwire_frame::HEADER_SIZE {
        return Err(CliError::new(
            USAGE,
            format!("--max-message-size must be at least {}", pixwire_frame::HEADER_SIZE),
        ));
    }

    Ok(ServerConfig {
        listen_addr: args.listen.clone(),
        idle_timeout: args.idle_timeout,
        sweep_period: args.sweep_period,
        max_message_size: args.max_message_size,
        poll_interval: Some(args.poll_interval),
        ..ServerConfig::default()
    })
}

fn install_ctrlc_handler(shutdown: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, shutting down");
        shutdown.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn args() -> ServeArgs {
        ServeArgs {
            listen: "127.0.0.1:0".to_string(),
            idle_timeout: Duration::from_secs(3),
            sweep_period: None,
            max_message_size: 4096,
            poll_interval: Duration::from_millis(250),
            respond: ResponseMode::Echo,
        }
    }

    #[test]
    fn config_reflects_arguments() {
        let config = server_config(&args()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:0");
        assert_eq!(config.idle_timeout, Duration::from_secs(3));
        assert_eq!(config.sweep_period(), Duration::from_secs(3));
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.poll_interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_message_size_below_header() {
        let args = ServeArgs {
            max_message_size: 1,
            ..args()
        };
        assert_eq!(server_config(&args).unwrap_err().code, USAGE);
    }
}
