//! `rdb`: shorthand for `rdebrid`

#[tokio::main]
async fn main() {
    std::process::exit(rdebrid_cli::run().await);
}
