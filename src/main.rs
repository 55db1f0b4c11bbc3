use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};

use daily_bite::config::Config;
use daily_bite::db::Database;
use daily_bite::http::HttpObjectStore;
use daily_bite::logger::{self, LogConfig};
use daily_bite::models::SummarizationLength;
use daily_bite::newspaper::{LoadOutcome, Newspaper};
use daily_bite::store::{ObjectStore, StaticIdentity};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "daily-bite.yaml")]
    config: String,

    /// Overrides `database_url` from the configuration
    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill the database with a demo reader, topics and articles
    Seed,

    /// List published topics and the user's subscriptions
    Topics {
        #[arg(short, long)]
        user: String,
    },

    Subscribe {
        #[arg(short, long)]
        user: String,
        #[arg(required = true)]
        topics: Vec<String>,
    },

    Unsubscribe {
        #[arg(short, long)]
        user: String,
        #[arg(required = true)]
        topics: Vec<String>,
    },

    /// Suggest a topic that is not covered yet
    Suggest {
        #[arg(short, long)]
        user: String,
        topic: String,
    },

    /// Print the newspaper of a subscribed topic
    Read {
        #[arg(short, long)]
        user: String,

        /// Topic id, defaults to the first subscribed topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Pages to load, the first one comes from the refresh
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// short, medium or full
        #[arg(short, long)]
        length: Option<SummarizationLength>,

        /// Article ids to expand with their summary text
        #[arg(short, long)]
        expand: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(database) = args.database {
        config.database_url = database;
    }
    if let Some(level) = args.log_level {
        config.log.console_level = level;
    }
    if let Some(file) = args.log_file {
        config.log.file = Some(file);
    }
    logger::init(LogConfig::from(&config.log))?;

    let db = Arc::new(Database::new(&config.database_url).await?);

    match args.command {
        Command::Seed => {
            let user = db
                .seed_demo(&config.object_store.bucket, Utc::now().date_naive())
                .await?;
            println!("Seeded demo data. Try: daily-bite read --user {}", user.user_id);
        }
        Command::Topics { user } => {
            println!("News topics:");
            for listing in db.list_topics(&user).await? {
                let last = listing
                    .last_publishing_date
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "[{}] {} - {} ({}) {}",
                    if listing.is_user_subscribed { "x" } else { " " },
                    listing.topic.topic_id,
                    listing.topic.name,
                    listing.topic.category,
                    last
                );
            }
        }
        Command::Subscribe { user, topics } => {
            for topic_id in topics {
                if db.subscribe(&user, &topic_id).await? {
                    info!("Subscribed user id {} to topic id {}", user, topic_id);
                    println!("Subscribed to {}", topic_id);
                } else {
                    println!("Already subscribed to {} (or no such topic)", topic_id);
                }
            }
        }
        Command::Unsubscribe { user, topics } => {
            for topic_id in topics {
                if db.unsubscribe(&user, &topic_id).await? {
                    info!("Unsubscribed user id {} from topic id {}", user, topic_id);
                    println!("Unsubscribed from {}", topic_id);
                } else {
                    println!("Not subscribed to {}", topic_id);
                }
            }
        }
        Command::Suggest { user, topic } => {
            if db.suggest_topic(&user, &topic).await? {
                info!("Saved topic suggestion from user id {}", user);
                println!("Thank you for your suggestion!");
            } else {
                println!("Nothing to suggest");
            }
        }
        Command::Read {
            user,
            topic,
            pages,
            length,
            expand,
        } => {
            let identity = db.find_user(&user).await?;
            if identity.is_none() {
                warn!("Unknown user id {}", user);
            }

            let objects: Arc<dyn ObjectStore> = match &config.object_store.base_url {
                Some(base_url) => Arc::new(HttpObjectStore::new(base_url)),
                None => db.clone(),
            };
            let newspaper = Newspaper::new(
                config.clone(),
                Arc::new(StaticIdentity(identity)),
                db.clone(),
                db.clone(),
                objects,
            );

            read(&newspaper, topic, pages, length, &expand).await?;
        }
    }

    Ok(())
}

async fn read(
    newspaper: &Newspaper,
    topic: Option<String>,
    pages: usize,
    length: Option<SummarizationLength>,
    expand: &[String],
) -> Result<()> {
    newspaper.refresh_subscribed_topics().await?;
    if !newspaper.has_subscribed_topics() {
        println!("No subscribed topics. Subscribe to a topic first.");
        return Ok(());
    }
    if let Some(topic_id) = topic {
        newspaper.select_topic(&topic_id)?;
    }
    if let Some(length) = length {
        newspaper.select_summarization_length(length);
    }

    let selected = newspaper
        .selected_topic()
        .ok_or_else(|| anyhow!("no topic selected"))?;
    newspaper.refresh_topic(&selected.topic_id).await?;

    for _ in 1..pages {
        if let LoadOutcome::Skipped(reason) = newspaper.load_more_articles().await? {
            info!("Stopped loading more articles: {:?}", reason);
            break;
        }
    }

    for article_id in expand {
        newspaper.set_expanded(&selected.topic_id, article_id, true)?;
        newspaper
            .populate_article_text(&selected.topic_id, article_id)
            .await?;
    }

    print_newspaper(newspaper);
    Ok(())
}

fn print_newspaper(newspaper: &Newspaper) {
    let length = newspaper.selected_length();
    println!("{} ({} summaries)", newspaper.selected_topic_name(), length);

    for section in newspaper.selected_sections() {
        println!();
        println!("== {} ==", section.label);
        for article in &section.articles {
            println!(
                "  [{}] {} ({})",
                article.article_id,
                article.title,
                article.published_on()
            );
            for (i, url) in article.source_urls.iter().enumerate() {
                let provider = article.source_providers.get(i).map(String::as_str).unwrap_or("source");
                println!("      {}: {}", provider, url);
            }
            if article.is_expanded {
                if let Some(text) = article.shown_text() {
                    println!("      {}", text.replace("<br>", "\n      "));
                }
            }
        }
    }
}
