use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/storefront.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateProduct {
        name: String,
        price: f64,
        #[arg(long, default_value = "")]
        img: String,
    },
    ListProducts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateProduct { name, price, img } => {
            if !price.is_finite() || price < 0.0 {
                bail!("price must be a non-negative number, got {price}");
            }
            let product_id = storage.create_product(&name, price, &img).await?;
            println!("created product_id={}", product_id.0);
        }
        Command::ListProducts => {
            for product in storage.list_products().await? {
                println!("{}\t{}\t{:.2}\t{}", product.id.0, product.name, product.price, product.img);
            }
        }
    }

    Ok(())
}
