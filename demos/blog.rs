//! A tiny blog on top of FastTrack.
//!
//! ```text
//! cargo run --example blog -- -c demos/blog/fasttrack.toml serve
//! cargo run --example blog -- -c demos/blog/fasttrack.toml action Blog::Posts.count
//! ```
//!
//! Routes come from `demos/blog/fasttrack.toml`; try `/`, `/posts/hello-world`,
//! `/posts/nope` (error route), `/missing` (not-found route) and
//! `/_fasttrack/action/Blog/Posts.count` (direct action call).

use std::path::PathBuf;

use clap::Parser;
use fasttrack::cli::Cli;
use fasttrack::config::Config;
use fasttrack::controller::{Actions, Controller};
use fasttrack::engine::{Engine, FormData};
use fasttrack::validation::{Rule, Validator};
use fasttrack::view::ViewBag;
use fasttrack::{Context, Error, Result};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_CONFIG: &str = "demos/blog/fasttrack.toml";

struct Post {
    slug: &'static str,
    title: &'static str,
    body: &'static str,
}

const POSTS: &[Post] = &[
    Post {
        slug: "hello-world",
        title: "Hello, world",
        body: "The first post of this blog.",
    },
    Post {
        slug: "master-views",
        title: "Master views & blocks",
        body: "Pages inherit the layout and fill its title and content blocks.",
    },
    Post {
        slug: "direct-actions",
        title: "Direct action calls",
        body: "Actions registered with action_url can be called without a route.",
    },
];

fn find_post(slug: &str) -> Option<&'static Post> {
    POSTS.iter().find(|post| post.slug == slug)
}

fn post_json(post: &Post) -> serde_json::Value {
    json!({ "slug": post.slug, "title": post.title, "body": post.body })
}

#[derive(Default)]
struct Posts;

impl Posts {
    fn index(&mut self, ctx: &mut Context) -> Result<String> {
        let mut items = String::new();
        for post in POSTS {
            items.push_str(&ctx.render("~/views/posts/item.html", ViewBag::new().with("post", post_json(post)))?);
        }
        ctx.render("~/views/posts/index.html", ViewBag::new().with("items", items))
    }

    fn show(&mut self, ctx: &mut Context) -> Result<String> {
        let slug = ctx.param("slug").unwrap_or_default();
        let post = find_post(slug).ok_or_else(|| Error::action(format!("no post named {slug}")))?;

        let bag = ViewBag::from(ctx.params()).with("post", post_json(post));
        ctx.render("~/views/posts/show.html", bag)
    }

    fn comment(&mut self, ctx: &mut Context) -> Result<String> {
        let form = ctx
            .extensions()
            .get::<FormData>()
            .map(|form| form.0.clone())
            .unwrap_or_default();

        let validator = Validator::new()
            .required("body", "Write something before posting.")
            .rule("email", Rule::Email, "That email address does not look right.");
        if let Err(errors) = validator.validate(&form) {
            let bag = ViewBag::from(ctx.params()).with("errors", errors.messages().join(" "));
            return ctx.render("~/views/posts/invalid.html", bag);
        }

        let author = form
            .get("author")
            .filter(|author| !author.trim().is_empty())
            .unwrap_or("anonymous")
            .to_owned();

        let bag = ViewBag::from(ctx.params()).with("author", author);
        ctx.render("~/views/posts/thanks.html", bag)
    }

    fn count(&mut self, _ctx: &mut Context) -> Result<String> {
        Ok(json!({ "posts": POSTS.len() }).to_string())
    }
}

impl Controller for Posts {
    fn actions() -> Actions<Self> {
        Actions::new()
            .action("index", Self::index)
            .action("show", Self::show)
            .action("comment", Self::comment)
            .action_url("count", Self::count)
    }
}

#[derive(Default)]
struct Errors;

impl Errors {
    fn not_found(&mut self, ctx: &mut Context) -> Result<String> {
        ctx.render("~/views/errors/not_found.html", ctx.params())
    }

    fn error(&mut self, ctx: &mut Context) -> Result<String> {
        ctx.render("~/views/errors/error.html", ctx.params())
    }
}

impl Controller for Errors {
    fn actions() -> Actions<Self> {
        Actions::new()
            .action("not_found", Self::not_found)
            .action("error", Self::error)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fasttrack=debug,blog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = if cli.config.exists() {
        cli.config.clone()
    } else {
        PathBuf::from(DEMO_CONFIG)
    };
    let config = Config::load(&config_path)?;
    tracing::info!(config = %config_path.display(), routes = config.routes.len(), "blog starting");

    let engine = Engine::builder(config)
        .controller::<Posts>("Blog::Posts")
        .controller::<Errors>("Site::Errors")
        .build()?;

    cli.command.execute(engine).await?;
    Ok(())
}
