#[cfg(feature = "use_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use vlr_web_api::{
    Config, DataRoutes,
    server::{init_tracing, start_server},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing(&config);
    // The scraper's match and news routes are merged in by whoever embeds the library.
    start_server(config, DataRoutes::default()).await
}
