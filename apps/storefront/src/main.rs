use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, CartView, ClientCore, ClientEvent, Severity};
use shared::domain::ProductId;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::debug;

#[derive(Parser, Debug)]
struct Args {
    /// Overrides `api_url` from storefront.toml / API_URL.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    state_database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Products,
    Cart,
    Add {
        product_id: i64,
    },
    Remove {
        product_id: i64,
    },
    Logout,
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(state_database_url) = args.state_database_url {
        settings.state_database_url = state_database_url;
    }
    debug!(?settings, "resolved settings");

    let core = ClientCore::connect(&settings).await?;
    let mut events = core.subscribe_events();
    let outcome = run(&core, args.command).await;
    print_events(&mut events);
    outcome
}

async fn run(core: &ClientCore, command: Command) -> Result<()> {
    let shop = &core.storefront;
    match command {
        Command::Login { email, password } => {
            let user = shop.login(&email, &password).await?;
            println!("signed in as {} <{}>", user.username, user.email);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let created = shop.register(&username, &email, &password).await?;
            println!("{} (user_id={})", created.message, created.user.id.0);
        }
        Command::Products => {
            for product in shop.products().await? {
                println!(
                    "{:>4}  {:<32} {:>9.2}  {}",
                    product.id.0, product.name, product.price, product.img
                );
            }
        }
        Command::Cart => {
            let view = CartView::load(shop).await?;
            if view.items().is_empty() {
                println!("cart is empty");
            }
            for line in view.items() {
                println!(
                    "{:>4}  {:<32} {:>9.2}",
                    line.product_id.0, line.product.name, line.product.price
                );
            }
        }
        Command::Add { product_id } => {
            shop.add_to_cart(ProductId(product_id)).await?;
            println!("added product {product_id}");
        }
        Command::Remove { product_id } => {
            let mut view = CartView::load(shop).await?;
            view.remove(shop, ProductId(product_id))
                .await
                .with_context(|| format!("failed to remove product {product_id}"))?;
            println!("removed product {product_id}; {} line(s) left", view.items().len());
        }
        Command::Logout => {
            shop.logout().await?;
            println!("signed out");
        }
        Command::Whoami => {
            let session = core.session.get().await?;
            match session.user {
                Some(user) if session.token.is_some() => {
                    println!("{} <{}> (user_id={})", user.username, user.email, user.id.0)
                }
                _ => println!("not signed in"),
            }
        }
    }
    Ok(())
}

fn print_events(events: &mut Receiver<ClientEvent>) {
    loop {
        match events.try_recv() {
            Ok(ClientEvent::Notification(note)) => match note.severity {
                Severity::Success => println!("[ok] {}", note.message),
                Severity::Error => eprintln!("[error] {}", note.message),
            },
            Ok(ClientEvent::Navigation { route }) => println!("-> navigate to {route}"),
            Ok(ClientEvent::Progress { .. }) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
