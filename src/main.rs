mod config;
mod framer;
mod logging;
mod navigator;
mod robot;
mod server;
mod session;
mod vector;
mod wire;

use std::io;

use clap::Parser;

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = config::Config::parse();
    logging::set_up();

    server::run(config).await
}
