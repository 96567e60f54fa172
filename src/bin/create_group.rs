//! Creates a community group that posts can be filed under
//! Run with: cargo run --bin create_group -- <title> <slug> [description]

use yatube::{config::Config, db::Database, models::NewGroup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(title), Some(slug)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: create_group <title> <slug> [description]");
    };
    let description = args.collect::<Vec<_>>().join(" ");

    let config = Config::from_env()?;

    println!("Connecting to database...");
    let database = Database::new(config.database).await?;
    database.migrate().await?;

    let group = database
        .create_group(NewGroup::new(title, slug, description))
        .await?;

    println!("Group created successfully!");
    println!("Title: {}", group.title);
    println!("URL:   /group/{}/", group.slug);

    Ok(())
}
