//! # fasttrack
//!
//! A small MVC web framework: regex route dispatch with fallback tiers,
//! allow-listed direct action calls, and views composed through
//! master/child inheritance of named content blocks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fasttrack::config::Config;
//! use fasttrack::controller::{Actions, Controller};
//! use fasttrack::router::RouteDefinition;
//! use fasttrack::{Context, Engine, Result, Server};
//!
//! #[derive(Default)]
//! struct Home;
//!
//! impl Home {
//!     fn index(&mut self, ctx: &mut Context) -> Result<String> {
//!         ctx.render("~/views/home.html", ctx.params())
//!     }
//! }
//!
//! impl Controller for Home {
//!     fn actions() -> Actions<Self> {
//!         Actions::new().action("index", Self::index)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(Config::default())
//!         .controller::<Home>("App::Home")
//!         .route("home", RouteDefinition::new("/", "App::Home", "index").methods("GET"))
//!         .build()?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(Arc::new(engine)).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod error;
pub mod http;
pub mod router;
pub mod security;
pub mod server;
pub mod validation;
pub mod view;

pub use context::{Context, Parameters};
pub use engine::{Engine, Reply};
pub use error::{Error, Result};
pub use http::{Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
