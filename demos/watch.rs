use std::time::Duration;

use schemakv::{Client, Constraints, Field, FieldType, Schema, Settings};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Web {
    host: String,
    port: u16,
    tls: bool,
}

#[tokio::main]
async fn main() -> Result<(), schemakv::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schemakv=debug")),
        )
        .init();

    // SCHEMAKV__STORE__BACKEND=redis SCHEMAKV__STORE__URL=redis://... to use redis
    let settings = Settings::builder()
        .with_file("demos/schemakv.toml", false)
        .with_env("SCHEMAKV", "__")
        .build()?;
    let client = Client::connect(&settings).await?;

    let schema = Schema::new(
        vec![
            Field::new("host", FieldType::String),
            Field::new("port", FieldType::Int).with_constraints(Constraints::range(1.0, 65535.0)),
            Field::new("tls", FieldType::Bool),
        ],
        "web front end",
    );
    client.schemas().put_schema("shop", "web", 1, &schema).await?;

    let prod = client.resolver("shop", "web", 1, "prod");
    prod.set("host", "shop.example").await?;
    prod.set("port", "8443").await?;
    prod.set("tls", "true").await?;

    if let Err(e) = prod.set("port", "99999").await {
        println!("rejected: {e}");
    }

    let web: Web = prod.load_config().await?;
    println!("loaded: {web:?}");

    // A second writer changes the port; the watching resolver picks it up.
    let watch = prod.start_watching().await?;
    let writer = client.resolver("shop", "web", 1, "prod");
    writer.set("port", "9443").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("port after change: {}", prod.get_int("port").await?);
    watch.stop().await;

    client.catalog().refresh().await?;
    for config in client.catalog().list_configs().await? {
        println!(
            "{}/{}/v{}/{}: {:?}",
            config.app, config.module, config.version, config.config, config.description
        );
    }

    Ok(())
}
