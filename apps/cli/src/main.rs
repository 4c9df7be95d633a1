//! rdebrid - unrestrict links and magnets through Real-Debrid and download them

#[tokio::main]
async fn main() {
    std::process::exit(rdebrid_cli::run().await);
}
