use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use estimator_core::config::Config;
use estimator_core::content::{Blog, PostFeed, PostFilter, SanityClient};
use std::path::Path;

#[derive(Subcommand)]
pub enum BlogSubcommand {
    /// List posts, newest first
    List {
        /// Prefix search on title, excerpt and tag names
        #[arg(long)]
        search: Option<String>,
        /// Category id (see 'estimator blog categories')
        #[arg(long)]
        category: Option<String>,
        /// Page number, starting at 1
        #[arg(
            long,
            default_value_t = 1,
            conflicts_with = "all",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        page: u32,
        /// Keep loading pages until every match is listed
        #[arg(long)]
        all: bool,
    },

    /// Show a single post
    Show { slug: String },

    /// List categories
    Categories,
}

pub fn run(root: &Path, subcmd: BlogSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let client = SanityClient::new(&config.content).context("failed to build content client")?;
    let blog = Blog::new(client, config.content.page_size);

    match subcmd {
        BlogSubcommand::List {
            search,
            category,
            page,
            all,
        } => {
            let filter = PostFilter {
                search,
                category,
                offset: page.saturating_sub(1).saturating_mul(blog.page_size()),
            };
            list(&blog, &filter, all, json)
        }
        BlogSubcommand::Show { slug } => show(&blog, &slug, json),
        BlogSubcommand::Categories => categories(&blog, json),
    }
}

fn list(
    blog: &Blog<SanityClient>,
    filter: &PostFilter,
    all: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut feed = PostFeed::new();
    feed.offset = filter.offset;
    blog.load_more(&mut feed, filter).context("failed to list posts")?;
    while all && feed.has_more {
        blog.load_more(&mut feed, filter).context("failed to list posts")?;
    }

    if json {
        return print_json(&feed);
    }
    if feed.items.is_empty() {
        println!("No posts found.");
        return Ok(());
    }
    let rows = feed
        .items
        .iter()
        .map(|p| {
            vec![
                p.published_at
                    .as_deref()
                    .map(|d| d.chars().take(10).collect::<String>())
                    .unwrap_or_default(),
                p.slug.clone(),
                p.title.clone(),
                p.categories.join(", "),
            ]
        })
        .collect();
    print_table(&["DATE", "SLUG", "TITLE", "CATEGORIES"], rows);
    println!(
        "\nShowing {}-{} of {} posts",
        filter.offset + 1,
        feed.offset,
        feed.total
    );
    if feed.has_more {
        println!("More available: use --page or --all.");
    }
    Ok(())
}

fn show(blog: &Blog<SanityClient>, slug: &str, json: bool) -> anyhow::Result<()> {
    let post = blog
        .post(slug)
        .with_context(|| format!("failed to load post '{slug}'"))?
        .with_context(|| format!("post '{slug}' not found"))?;

    if json {
        return print_json(&post);
    }
    println!("{}", post.title);
    let mut meta = Vec::new();
    if let Some(date) = &post.published_at {
        meta.push(date.chars().take(10).collect::<String>());
    }
    if let Some(author) = &post.author {
        meta.push(format!("by {}", author.name));
    }
    if let Some(minutes) = post.reading_minutes {
        meta.push(format!("{minutes} min read"));
    }
    if !meta.is_empty() {
        println!("{}", meta.join(" · "));
    }
    if !post.categories.is_empty() {
        println!("Categories: {}", post.categories.join(", "));
    }
    for paragraph in post.paragraphs() {
        println!("\n{paragraph}");
    }
    Ok(())
}

fn categories(blog: &Blog<SanityClient>, json: bool) -> anyhow::Result<()> {
    let categories = blog.categories().context("failed to list categories")?;
    if json {
        return print_json(&categories);
    }
    let rows = categories
        .iter()
        .map(|c| vec![c.id.clone(), c.title.clone()])
        .collect();
    print_table(&["ID", "TITLE"], rows);
    Ok(())
}
