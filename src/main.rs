use supabase_functions_provider::{init_logging, serve, SupabaseProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting supabase provider");
    serve(SupabaseProvider::new()).await
}
