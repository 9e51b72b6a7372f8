mod runtime;

#[tokio::main]
async fn main() {
    runtime::run_from_args().await;
}
