use hemmer_provider_artifactory::{init_logging, serve, ArtifactoryProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(ArtifactoryProvider::new()).await
}
