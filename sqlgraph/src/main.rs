//! sqlgraph demo - reflect a small pets schema and run one query against it
//!
//! Prints the SDL of the generated schema and the response to a query that
//! walks reporters, their pets connection and a relay node lookup.

mod demo;

use async_graphql::Request;
use sqlgraph::Config;
use sqlgraph::graphql::orm::to_global_id;
use sqlgraph::mapping::SessionHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqlgraph=debug,sqlgraph_demo=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(?config, "Starting sqlgraph demo");

    let catalog = demo::catalog()?;
    let session = demo::session();
    let schema = demo::schema(&config, &catalog, session.clone())?;

    println!("{}", schema.sdl());

    let query = format!(
        r#"{{
            reporters {{
                id
                first_name
                favorite_pet_kind
                pets(first: 1) {{
                    edges {{ cursor node {{ id name pet_kind }} }}
                    pageInfo {{ hasNextPage endCursor }}
                }}
            }}
            node(id: "{}") {{
                id
                ... on Pet {{ name }}
            }}
        }}"#,
        to_global_id("Pet", "2")
    );
    let request = Request::new(query).data(SessionHandle::Sync(session));
    let response = schema.execute(request).await;

    if !response.errors.is_empty() {
        for error in &response.errors {
            tracing::error!(error = %error.message, "Query failed");
        }
    }
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
