//! # gdb-driver
//!
//! A Rust client for Gremlin servers speaking GraphSON v3 over WebSocket.
//!
//! ## Features
//!
//! - **Multiplexed connections** - Many in-flight requests per WebSocket, routed by request id
//! - **Connection Pooling** - Lazy dialing, health probes, age-based retirement and reconnect backoff
//! - **Sessions** - Server-side sessions with `OPEN`/`COMMIT`/`ROLLBACK` batch transactions
//! - **Admission control** - Circuit breaker driven by transport failures only
//! - **Typed results** - Vertices, edges, properties, paths, bulk sets and traversers
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! gdb-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gdb_driver::{bindings, Client, ClientShell, Context, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::builder()
//!         .host("localhost")
//!         .port(8182)
//!         .credentials("user", "secret")
//!         .build();
//!     let client = Client::connect(settings).await?;
//!
//!     let ctx = Context::with_timeout(std::time::Duration::from_secs(5));
//!     let results = client
//!         .submit_script_bound(&ctx, "g.V().has('name', name)", bindings! { "name" => "marko" })
//!         .await?;
//!
//!     for result in results {
//!         println!("{}", result);
//!     }
//!
//!     client.close(&ctx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! Session clients run statements on a single ordered connection and wrap
//! them in an explicit transaction:
//!
//! ```rust,no_run
//! # use gdb_driver::{ClientShell, Context, SessionClient, Settings};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionClient::connect("import-42", Settings::default()).await?;
//! let ctx = Context::background();
//!
//! session
//!     .batch_submit(&ctx, |ctx, shell| async move {
//!         shell.submit_script(&ctx, "g.addV('person').property('name', 'marko')").await?;
//!         shell.submit_script(&ctx, "g.addV('software').property('name', 'lop')").await?;
//!         Ok(())
//!     })
//!     .await?;
//!
//! session.close(&ctx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`DriverResult`]:
//!
//! ```rust,no_run
//! # use gdb_driver::{Client, ClientShell, Context, DriverError, Settings};
//! # async fn example(client: Client) {
//! match client.submit_script(&Context::background(), "g.V().count()").await {
//!     Ok(results) => println!("{} results", results.len()),
//!     Err(DriverError::Application { code, message }) => eprintln!("server said {}: {}", code, message),
//!     Err(DriverError::AdmissionDenied(msg)) => eprintln!("breaker open: {}", msg),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Clients, sessions, pooling and futures
//! - [`graphson`] - Low-level GraphSON v3 protocol messages
//! - [`graph`] - Graph data model decoded from responses
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod graph;
pub mod graphson;

// Re-exports for convenience
pub use driver::{
    Client, ClientBuilder, ClientShell, Context, DriverError, DriverResult, GraphResult,
    ResultSetFuture, SessionClient, SessionShell, Settings, TransactionState,
};

pub use graph::{BulkSet, Edge, Path, Property, Value, Vertex, VertexProperty};

pub use graphson::{GraphsonError, RequestOptions};
