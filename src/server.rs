use std::io;
use std::net::Ipv4Addr;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::Config;
use crate::session::Session;

/// Binds the listener and serves robots until no new connection arrives
/// within the accept deadline. Returns the bind error verbatim so the
/// process can exit non-zero on it.
pub(crate) async fn run(config: Config) -> io::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    serve(listener, config).await
}

async fn serve(listener: TcpListener, config: Config) -> io::Result<()> {
    let mut sessions = JoinSet::new();

    loop {
        match tokio::time::timeout(config.accept_timeout(), listener.accept()).await {
            Ok(Ok((socket, addr))) => {
                let session = Session::new(socket, &config);
                sessions.spawn(
                    session
                        .run()
                        .instrument(tracing::trace_span!("robot", addr = addr.to_string())),
                );
            }
            Ok(Err(error)) => {
                tracing::warn!("accept failed: {error}");
            }
            Err(_) => {
                tracing::info!(
                    "no new connections for {:?}, shutting down",
                    config.accept_timeout()
                );
                break;
            }
        }
    }

    // Robots already being guided get to finish.
    while sessions.join_next().await.is_some() {}
    Ok(())
}
