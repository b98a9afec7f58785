use hostel_occupancy_backend::error::AppError;
use hostel_occupancy_backend::{run_server, setup_tracing};
use hostel_occupancy_config::get_config;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = get_config()?;
    setup_tracing(&config)?;

    run_server(config).await?.await
}
