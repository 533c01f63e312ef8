use scriptorium_core::{GenerateRequest, Message};
use scriptorium_interface::ScriptoriumDriver;
use scriptorium_server::ServerConfig;

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)] // Requires a running inference server
async fn test_backend_health_and_short_generation() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let backend = config.connect();
    backend.health_check().await?;

    let request = GenerateRequest::builder()
        .messages(vec![Message::user("Name one harbor town in a single word.")])
        .max_tokens(Some(16u32))
        .stream(true)
        .build()?;
    let response = backend.generate(&request).await?;

    assert!(!response.text().trim().is_empty());
    println!("{}: {}", backend.provider_name(), response.text());
    Ok(())
}
